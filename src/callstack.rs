//! Live call-frame tracking for the interpreter.
//!
//! Every user-function call pushes a [`CallFrame`]; the frame count doubles as
//! the recursion counter, so the depth check and the trace can never disagree.
//! Errors snapshot the frames (outermost first) at the point they are raised.

use std::fmt;

use crate::diagnostics::{ErrorKind, RuntimeError};

/// Recursion limit a fresh interpreter starts with.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// One active, not yet returned call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub function_name: String,
    /// File the call was made from.
    pub file_name: String,
    /// Line of the call site.
    pub line: usize,
}

impl CallFrame {
    pub fn new(function_name: impl Into<String>, file_name: impl Into<String>, line: usize) -> Self {
        Self {
            function_name: function_name.into(),
            file_name: file_name.into(),
            line,
        }
    }
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function_name, self.file_name, self.line)
    }
}

#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    limit: usize,
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new(DEFAULT_RECURSION_LIMIT)
    }
}

impl CallStack {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Vec::new(),
            limit,
        }
    }

    /// Push a frame unless doing so would exceed the recursion limit.
    ///
    /// On overflow nothing is pushed and the returned `StackOverflow` error
    /// carries the frames that were active when the call was rejected.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.limit {
            tracing::warn!(
                limit = self.limit,
                function = %frame.function_name,
                "recursion limit reached"
            );
            return Err(RuntimeError::new(
                ErrorKind::StackOverflow,
                format!("maximum recursion depth {} exceeded", self.limit),
            )
            .with_trace(self.snapshot()));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(
            !self.frames.is_empty(),
            "CallStack::pop() called on empty stack"
        );
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Lowering the limit below the current depth only affects future calls.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn snapshot(&self) -> Vec<CallFrame> {
        self.frames.clone()
    }
}
