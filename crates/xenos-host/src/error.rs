#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("out of device memory allocating {what} ({size} bytes)")]
    OutOfMemory { what: &'static str, size: u64 },
    #[error("failed to create {what}: {reason}")]
    CreationFailed { what: &'static str, reason: String },
    #[error("no free {0} descriptors")]
    DescriptorsExhausted(&'static str),
    #[error("guest range 0x{start:08x}+0x{length:x} is not available")]
    RangeUnavailable { start: u32, length: u32 },
}
