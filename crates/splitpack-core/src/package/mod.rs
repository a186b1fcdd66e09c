pub mod descriptor;

pub use descriptor::{ArtifactDescriptor, LibDescriptor, LibSet, PackageDescriptor, SplitManifest};
