//! The wiring stack: beans currently being wired, in call order

use std::fmt;
use std::sync::Arc;

use tracing::trace;

/// Push/pop tag delivered to wiring observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiringEvent {
    Push,
    Pop,
}

/// One bean in the middle of being wired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringFrame {
    pub bean_id: String,
    pub description: String,
}

/// Callback notified on every push and pop
pub type WiringObserver = Arc<dyn Fn(&WiringFrame, WiringEvent) + Send + Sync>;

/// Observer installed when the caller supplies none
pub fn trace_observer() -> WiringObserver {
    Arc::new(|frame: &WiringFrame, event: WiringEvent| match event {
        WiringEvent::Push => trace!(bean = %frame.bean_id, "wiring {}", frame.description),
        WiringEvent::Pop => trace!(bean = %frame.bean_id, "wired {}", frame.description),
    })
}

/// Stack owned by a single wiring session
pub struct WiringStack {
    frames: Vec<WiringFrame>,
    observers: Vec<WiringObserver>,
}

impl WiringStack {
    pub fn new(observers: Vec<WiringObserver>) -> Self {
        let observers = if observers.is_empty() {
            vec![trace_observer()]
        } else {
            observers
        };
        Self {
            frames: Vec::new(),
            observers,
        }
    }

    pub fn push(&mut self, frame: WiringFrame) {
        for observer in &self.observers {
            observer(&frame, WiringEvent::Push);
        }
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<WiringFrame> {
        let frame = self.frames.pop()?;
        for observer in &self.observers {
            observer(&frame, WiringEvent::Pop);
        }
        Some(frame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Render the stack bottom to top, one `=> description` line per frame
    pub fn path(&self) -> String {
        self.frames
            .iter()
            .map(|frame| format!("=> {}", frame.description))
            .collect::<Vec<_>>()
            .join(" ↩\n")
    }
}

impl Default for WiringStack {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for WiringStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringStack")
            .field("frames", &self.frames)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn frame(id: &str) -> WiringFrame {
        WiringFrame {
            bean_id: id.to_string(),
            description: format!("object bean \"{}\"", id),
        }
    }

    #[test]
    fn test_observers_see_push_and_pop_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let observer: WiringObserver = Arc::new(move |frame, event| {
            sink.lock().push((frame.bean_id.clone(), event));
        });

        let mut stack = WiringStack::new(vec![observer]);
        stack.push(frame("a"));
        stack.push(frame("b"));
        assert_eq!(stack.depth(), 2);
        stack.pop();
        stack.pop();
        assert!(stack.pop().is_none());

        assert_eq!(
            *events.lock(),
            vec![
                ("a".to_string(), WiringEvent::Push),
                ("b".to_string(), WiringEvent::Push),
                ("b".to_string(), WiringEvent::Pop),
                ("a".to_string(), WiringEvent::Pop),
            ]
        );
    }

    #[test]
    fn test_path_rendering() {
        let mut stack = WiringStack::default();
        assert_eq!(stack.path(), "");

        stack.push(frame("a"));
        stack.push(frame("b"));
        assert_eq!(
            stack.path(),
            "=> object bean \"a\" ↩\n=> object bean \"b\""
        );
    }
}
