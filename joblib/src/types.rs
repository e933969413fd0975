pub type JobId = u64;
pub type Owner = i64;
pub type Token = String;
pub type WorkflowPath = String;
pub type Program = String;
pub type OutputBlob = bytes::Bytes;

/// Owner value meaning "no owner was supplied".
pub const NO_OWNER: Owner = -1;
