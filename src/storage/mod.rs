pub mod memory;
pub mod persistence;

pub use memory::LocationStore;
pub use persistence::{
    FileSnapshotSink, SinkDocument, SnapshotMetadata, SnapshotSink, SNAPSHOT_FORMAT_VERSION,
    read_document, write_document,
};
