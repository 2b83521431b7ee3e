/// Return this error from a VU behaviour to indicate that the VU is giving up for the rest of the
/// run.
///
/// Use it for problems that make further iterations pointless for this VU, such as a missing
/// credential assignment. The other VUs keep running and the run is still reported normally.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("VU is bailing: {reason}")]
pub struct VuBailError {
    reason: String,
}

impl VuBailError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for VuBailError {
    fn default() -> Self {
        Self::new("no reason given")
    }
}
