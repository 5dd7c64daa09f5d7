use std::fmt;

/// Configuration parameters which can be overridden to tune the behavior of
/// an [`ArrayStack`].
///
/// This trait consists of a number of associated constants which are used to
/// determine the defaults used by a stack. Overriding a constant changes the
/// default for every stack constructed with that configuration type. All
/// constants on this trait have default values, so a custom configuration
/// only needs to override the ones it cares about.
///
/// # Examples
///
/// ```
/// use lockfree_stack::{ArrayStack, Config};
///
/// struct Tiny;
///
/// impl Config for Tiny {
///     const DEFAULT_CAPACITY: usize = 4;
/// }
///
/// let stack = ArrayStack::<u32, Tiny>::new_with_config();
/// assert_eq!(stack.capacity(), 4);
/// ```
///
/// [`ArrayStack`]: crate::ArrayStack
pub trait Config: Sized {
    /// The capacity used when a stack is constructed without one, or with a
    /// capacity of zero.
    ///
    /// This must be greater than zero.
    const DEFAULT_CAPACITY: usize = 256;

    /// The largest capacity a stack may be constructed with.
    const MAX_CAPACITY: usize = isize::MAX as usize;
}

pub(crate) trait CfgPrivate: Config {
    /// Returns the capacity a stack will actually be built with.
    fn normalize(capacity: usize) -> usize {
        if capacity == 0 {
            Self::DEFAULT_CAPACITY
        } else {
            capacity
        }
    }

    fn validate() {
        assert!(
            Self::DEFAULT_CAPACITY > 0,
            "the default capacity must be at least 1"
        );
        assert!(
            Self::DEFAULT_CAPACITY <= Self::MAX_CAPACITY,
            "the default capacity ({}) exceeds the maximum ({})",
            Self::DEFAULT_CAPACITY,
            Self::MAX_CAPACITY,
        );
    }

    fn debug() -> DebugConfig<Self> {
        DebugConfig { _cfg: Default::default() }
    }
}

impl<C: Config> CfgPrivate for C {}

/// Default configuration parameters.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultConfig {
    _p: (),
}

pub(crate) struct DebugConfig<C: Config> {
    _cfg: std::marker::PhantomData<fn(C)>,
}

impl Config for DefaultConfig {}

impl<C: Config> fmt::Debug for DebugConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<C>())
            .field("default_capacity", &C::DEFAULT_CAPACITY)
            .field("max_capacity", &C::MAX_CAPACITY)
            .finish()
    }
}
