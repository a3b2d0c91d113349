//! Floating point control for ray tracing threads
//!
//! Denormal operands make the traversal and intersection math fall off the
//! fast path. Flush-to-zero (FTZ) and denormals-are-zero (DAZ) are per-thread
//! MXCSR bits, so they are set on the thread constructing the ray tracer and
//! on every worker thread of the bake pool.

/// MXCSR flush-to-zero bit
const FLUSH_ZERO_ON: u32 = 0x8000;
/// MXCSR denormals-are-zero bit
const DENORMALS_ZERO_ON: u32 = 0x0040;

/// Enable FTZ and DAZ on the calling thread
///
/// Returns false on targets without SSE control registers.
#[cfg(any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse")))]
#[allow(unsafe_code, deprecated)]
pub fn enable_flush_to_zero() -> bool {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::{_mm_getcsr, _mm_setcsr};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::{_mm_getcsr, _mm_setcsr};

    // SAFETY: SSE is present on these targets; only the FTZ and DAZ bits are changed
    unsafe {
        _mm_setcsr(_mm_getcsr() | FLUSH_ZERO_ON | DENORMALS_ZERO_ON);
    }
    true
}

/// Enable FTZ and DAZ on the calling thread
///
/// Returns false on targets without SSE control registers.
#[cfg(not(any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse"))))]
pub fn enable_flush_to_zero() -> bool {
    let _ = (FLUSH_ZERO_ON, DENORMALS_ZERO_ON);
    false
}

/// Whether FTZ and DAZ are active on the calling thread
#[cfg(any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse")))]
#[allow(unsafe_code, deprecated)]
pub fn flush_to_zero_enabled() -> bool {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::_mm_getcsr;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::_mm_getcsr;

    // SAFETY: reading MXCSR has no side effects
    let csr = unsafe { _mm_getcsr() };
    csr & (FLUSH_ZERO_ON | DENORMALS_ZERO_ON) == FLUSH_ZERO_ON | DENORMALS_ZERO_ON
}

/// Whether FTZ and DAZ are active on the calling thread
#[cfg(not(any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse"))))]
pub const fn flush_to_zero_enabled() -> bool {
    false
}
