use std::time::{Instant, SystemTime, UNIX_EPOCH};

use impl_trait_for_tuples::impl_for_tuples;

use crate::position::Timestamp;

/// A value provided by the system context rather than by any event, such as the current time.
///
/// Runners call [`generate`](SystemResource::generate) and hand the result to a
/// [`StateMachine`](crate::state_machine::StateMachine) as input.
pub trait SystemResource {
    /// Produce an instance of this resource from the ambient system context.
    fn generate() -> Self;
}

#[impl_for_tuples(1, 4)]
impl SystemResource for Tuple {
    fn generate() -> Self {
        for_tuples!( ( #( Tuple::generate() ),* ) )
    }
}

impl SystemResource for Instant {
    fn generate() -> Self {
        Instant::now()
    }
}

impl SystemResource for Timestamp {
    fn generate() -> Self {
        // a clock before 1970 is treated as the epoch
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Timestamp::from_millis(millis)
    }
}
