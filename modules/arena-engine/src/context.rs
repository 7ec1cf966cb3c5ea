use crate::cancel::CancelSignal;
use crate::observe::Observer;
use crate::retry::RetryPolicy;

/// What every oracle-calling component needs from the run: where to report,
/// how to retry, and when to stop.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub observer: &'a Observer,
    pub retry: &'a RetryPolicy,
    pub cancel: &'a CancelSignal,
}
