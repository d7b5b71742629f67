//! Change notifications emitted by the provider after its own mutations.
//!
//! Only changes made through the provider are reported. Out-of-band changes
//! to the backing store are invisible here.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub kind: FileChangeKind,
    /// The URI exactly as the host passed it in.
    pub uri: String,
}

impl FileChangeEvent {
    pub fn new(kind: FileChangeKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
        }
    }
}

/// Fan-out of event batches to any number of subscribers.
pub(crate) struct ChangeEmitter {
    sender: broadcast::Sender<Vec<FileChangeEvent>>,
}

impl ChangeEmitter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Vec<FileChangeEvent>> {
        self.sender.subscribe()
    }

    /// Publish one event. Having no subscribers is not an error.
    pub(crate) fn emit(&self, kind: FileChangeKind, uri: &str) {
        let _ = self.sender.send(vec![FileChangeEvent::new(kind, uri)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_batches() {
        let emitter = ChangeEmitter::new(4);
        let mut rx = emitter.subscribe();
        emitter.emit(FileChangeKind::Created, "azurestorage://a/x");
        let batch = rx.recv().await.unwrap();
        assert_eq!(
            batch,
            vec![FileChangeEvent::new(FileChangeKind::Created, "azurestorage://a/x")]
        );
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let emitter = ChangeEmitter::new(0);
        emitter.emit(FileChangeKind::Deleted, "x");
    }
}
