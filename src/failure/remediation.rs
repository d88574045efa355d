//! Remediation text for unhandled runtime faults.
//!
//! Kept as an ordered table so the message-signature → advice mapping can be
//! read and tested in one place. First matching signature wins.

/// Kind of failure a signature identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignature {
    ExceptionsDisabled,
    MemoryGrowthFailed,
    AllocationSize,
    OutOfMemory,
    Unrecognized,
}

#[derive(Debug, Clone, Copy)]
enum Advice {
    Fixed(&'static str),
    /// Generic notice quoting the raw message
    ReportRaw,
}

struct Remediation {
    pattern: &'static str,
    signature: FailureSignature,
    advice: Advice,
}

const EXCEPTIONS_DISABLED: &str = "An exception has occurred, but exception handling has been \
    disabled in this build. If you are the developer of this content, enable exceptions in your \
    project WebGL player settings to be able to catch the exception or see the stack trace.";

const MEMORY_GROWTH_FAILED: &str = "Out of memory. If you are the developer of this content, \
    try allocating more memory to your WebGL build in the WebGL player settings.";

const ALLOCATE_LESS: &str = "The browser could not allocate enough memory for the WebGL content. \
    If you are the developer of this content, try allocating less memory to your WebGL build in \
    the WebGL player settings.";

const REPORT_PREFIX: &str = "An error occurred running the Unity content on this page. See your \
    browser JavaScript console for more info. The error was:\n";

const REMEDIATIONS: &[Remediation] = &[
    Remediation {
        pattern: "DISABLE_EXCEPTION_CATCHING",
        signature: FailureSignature::ExceptionsDisabled,
        advice: Advice::Fixed(EXCEPTIONS_DISABLED),
    },
    Remediation {
        pattern: "Cannot enlarge memory arrays",
        signature: FailureSignature::MemoryGrowthFailed,
        advice: Advice::Fixed(MEMORY_GROWTH_FAILED),
    },
    Remediation {
        pattern: "Invalid array buffer length",
        signature: FailureSignature::AllocationSize,
        advice: Advice::ReportRaw,
    },
    Remediation {
        pattern: "Invalid typed array length",
        signature: FailureSignature::AllocationSize,
        advice: Advice::ReportRaw,
    },
    Remediation {
        pattern: "out of memory",
        signature: FailureSignature::OutOfMemory,
        advice: Advice::ReportRaw,
    },
    Remediation {
        pattern: "could not allocate memory",
        signature: FailureSignature::OutOfMemory,
        advice: Advice::ReportRaw,
    },
];

/// Identify which known failure a raw message represents.
pub fn signature_of(message: &str) -> FailureSignature {
    REMEDIATIONS
        .iter()
        .find(|r| message.contains(r.pattern))
        .map(|r| r.signature)
        .unwrap_or(FailureSignature::Unrecognized)
}

/// Text for the blocking notification shown for an unhandled fault.
pub fn remediation_text(message: &str) -> String {
    match REMEDIATIONS.iter().find(|r| message.contains(r.pattern)) {
        Some(Remediation {
            advice: Advice::Fixed(text),
            ..
        }) => text.to_string(),
        Some(Remediation {
            advice: Advice::ReportRaw,
            ..
        }) => format!("{}{}", REPORT_PREFIX, message),
        None => ALLOCATE_LESS.to_string(),
    }
}
