use retrace_store::{CodeDescriptor, ValueGraph};
use retrace_types::{CallId, Identity, Timestamp};

/// One captured binding: a name, its value descriptor, and optionally the
/// stable identity of the logical object it refers to.
///
/// The collector assigns identities; the core only threads them through to
/// the version timeline. The core never sees a live object — only this.
#[derive(Clone, Debug)]
pub struct CapturedValue {
    pub name: String,
    pub value: ValueGraph,
    pub identity: Option<Identity>,
}

impl CapturedValue {
    /// A binding with no identity tracking.
    pub fn new(name: impl Into<String>, value: ValueGraph) -> Self {
        Self {
            name: name.into(),
            value,
            identity: None,
        }
    }

    /// A binding whose logical object is tracked across time.
    pub fn with_identity(name: impl Into<String>, value: ValueGraph, identity: Identity) -> Self {
        Self {
            name: name.into(),
            value,
            identity: Some(identity),
        }
    }
}

/// A function call began.
#[derive(Clone, Debug)]
pub struct CallStart {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub args: Vec<CapturedValue>,
    pub globals: Vec<CapturedValue>,
    pub parent_call_id: Option<CallId>,
    /// Source of the function, captured once per distinct version.
    pub code: Option<CodeDescriptor>,
    pub timestamp: Timestamp,
}

impl CallStart {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
            args: Vec::new(),
            globals: Vec::new(),
            parent_call_id: None,
            code: None,
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: ValueGraph) -> Self {
        self.args.push(CapturedValue::new(name, value));
        self
    }

    pub fn with_tracked_arg(
        mut self,
        name: impl Into<String>,
        value: ValueGraph,
        identity: Identity,
    ) -> Self {
        self.args.push(CapturedValue::with_identity(name, value, identity));
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, value: ValueGraph) -> Self {
        self.globals.push(CapturedValue::new(name, value));
        self
    }

    pub fn with_parent(mut self, parent: CallId) -> Self {
        self.parent_call_id = Some(parent);
        self
    }

    pub fn with_code(mut self, code: CodeDescriptor) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A function call returned.
#[derive(Clone, Debug)]
pub struct CallEnd {
    pub call_id: CallId,
    pub return_value: Option<ValueGraph>,
    pub timestamp: Timestamp,
}

impl CallEnd {
    pub fn new(call_id: CallId) -> Self {
        Self {
            call_id,
            return_value: None,
            timestamp: Timestamp::now(),
        }
    }

    pub fn returning(mut self, value: ValueGraph) -> Self {
        self.return_value = Some(value);
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One line executed inside an open call.
#[derive(Clone, Debug)]
pub struct LineCapture {
    pub call_id: CallId,
    pub line: u32,
    pub locals: Vec<CapturedValue>,
    pub globals: Vec<CapturedValue>,
    pub timestamp: Timestamp,
}

impl LineCapture {
    pub fn new(call_id: CallId, line: u32) -> Self {
        Self {
            call_id,
            line,
            locals: Vec::new(),
            globals: Vec::new(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_local(mut self, name: impl Into<String>, value: ValueGraph) -> Self {
        self.locals.push(CapturedValue::new(name, value));
        self
    }

    pub fn with_tracked_local(
        mut self,
        name: impl Into<String>,
        value: ValueGraph,
        identity: Identity,
    ) -> Self {
        self.locals
            .push(CapturedValue::with_identity(name, value, identity));
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, value: ValueGraph) -> Self {
        self.globals.push(CapturedValue::new(name, value));
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// An event emitted by the collector.
#[derive(Clone, Debug)]
pub enum CaptureEvent {
    CallStart(CallStart),
    CallEnd(CallEnd),
    Line(LineCapture),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_start_builder() {
        let parent = CallId::new();
        let event = CallStart::new("f", "demo.py", 3)
            .with_arg("x", ValueGraph::int(1))
            .with_global("G", ValueGraph::int(2))
            .with_parent(parent)
            .at(Timestamp::from_millis(100));

        assert_eq!(event.args.len(), 1);
        assert_eq!(event.globals.len(), 1);
        assert_eq!(event.parent_call_id, Some(parent));
        assert_eq!(event.timestamp, Timestamp::from_millis(100));
    }

    #[test]
    fn tracked_arg_carries_identity() {
        let identity = Identity::new("obj:1").unwrap();
        let event = CallStart::new("f", "demo.py", 1).with_tracked_arg(
            "x",
            ValueGraph::int(1),
            identity.clone(),
        );
        assert_eq!(event.args[0].identity.as_ref(), Some(&identity));
    }

    #[test]
    fn call_end_builder() {
        let id = CallId::new();
        let event = CallEnd::new(id)
            .returning(ValueGraph::int(4))
            .at(Timestamp::from_millis(5));
        assert!(event.return_value.is_some());
        assert_eq!(event.call_id, id);
    }
}
