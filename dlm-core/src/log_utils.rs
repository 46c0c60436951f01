#[cfg(feature = "tracing")]
use crate::mode::LockMode;
#[cfg(feature = "tracing")]
use crate::owner::OwnerId;
#[cfg(feature = "tracing")]
use crate::policy::Policy;
#[cfg(feature = "tracing")]
use crate::resource::ResourceKey;

#[cfg(feature = "tracing")]
pub(crate) fn fmt_granted(owner: OwnerId, mode: LockMode, policy: Policy, key: ResourceKey) -> String {
    format!("Granted: {} - {} {} on {}", owner, mode, policy, key)
}

#[cfg(feature = "tracing")]
pub(crate) fn fmt_deferred(owner: OwnerId, mode: LockMode, policy: Policy, key: ResourceKey) -> String {
    format!("Deferred: {} - {} {} on {}", owner, mode, policy, key)
}

#[cfg(feature = "tracing")]
pub(crate) fn fmt_released(owner: OwnerId, mode: LockMode, policy: Policy, key: ResourceKey) -> String {
    format!("Released: {} - {} {} on {}", owner, mode, policy, key)
}

#[cfg(feature = "tracing")]
pub(crate) fn fmt_cancelled(owner: OwnerId, mode: LockMode, policy: Policy, key: ResourceKey) -> String {
    format!("Cancelled: {} - {} {} on {}", owner, mode, policy, key)
}
