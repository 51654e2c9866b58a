use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use retrace_store::ScalarValue;

/// A reconstructed live value.
///
/// Shared ownership with interior mutability is what lets reanimation
/// preserve identity: two bindings that referenced the same stored hash
/// come back as two clones of one `Rc`, and a cyclic container holds an
/// `Rc` to itself. Reanimated graphs are inspection/replay values and stay
/// on one thread.
pub type LiveValue = Rc<RefCell<LiveNode>>;

/// One node of a reconstructed value.
#[derive(Clone, Debug)]
pub enum LiveNode {
    Scalar(ScalarValue),
    Sequence(Vec<LiveValue>),
    Mapping(Vec<(String, LiveValue)>),
    Record {
        type_name: String,
        fields: Vec<(String, LiveValue)>,
    },
    /// Stand-in for a value that could not be reconstructed faithfully.
    /// Its presence always comes with a degraded flag on the result.
    Opaque { type_name: String, reason: String },
}

impl LiveNode {
    /// The scalar inside, if this is a scalar node.
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for the unrepresentable stand-in.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque { .. })
    }
}

/// Wrap a node in shared ownership.
pub fn live(node: LiveNode) -> LiveValue {
    Rc::new(RefCell::new(node))
}

/// Structural equality over live values, safe for cycles.
///
/// A pair of nodes already under comparison is taken as equal — the
/// coinductive reading, which makes two structurally identical cyclic
/// values compare equal instead of recursing forever.
pub fn structural_eq(a: &LiveValue, b: &LiveValue) -> bool {
    fn eq(a: &LiveValue, b: &LiveValue, visiting: &mut HashSet<(usize, usize)>) -> bool {
        let pair = (Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize);
        if pair.0 == pair.1 || !visiting.insert(pair) {
            return true;
        }
        let result = match (&*a.borrow(), &*b.borrow()) {
            (LiveNode::Scalar(x), LiveNode::Scalar(y)) => x == y,
            (LiveNode::Sequence(xs), LiveNode::Sequence(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| eq(x, y, visiting))
            }
            (LiveNode::Mapping(xs), LiveNode::Mapping(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|((xk, xv), (yk, yv))| xk == yk && eq(xv, yv, visiting))
            }
            (
                LiveNode::Record {
                    type_name: xt,
                    fields: xs,
                },
                LiveNode::Record {
                    type_name: yt,
                    fields: ys,
                },
            ) => {
                xt == yt
                    && xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|((xk, xv), (yk, yv))| xk == yk && eq(xv, yv, visiting))
            }
            (
                LiveNode::Opaque { type_name: xt, .. },
                LiveNode::Opaque { type_name: yt, .. },
            ) => xt == yt,
            _ => false,
        };
        visiting.remove(&pair);
        result
    }
    eq(a, b, &mut HashSet::new())
}
