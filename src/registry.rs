//! The active configuration instance.
//!
//! At most one [`Config`] is active at a time. [`install`] makes a loaded
//! configuration active and refuses while another one is live; [`clear`]
//! drops it so a new one can be installed. [`get_instance`] returns the
//! active instance, creating an empty one on first access.
//!
//! Access is single-threaded: the active slot belongs to the calling thread,
//! and handles are `Rc<RefCell<_>>`. Callers that need the configuration
//! elsewhere pass the [`ConfigHandle`] (or a [`Config`] value) explicitly.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::ops::Config;

/// Shared handle to the active configuration.
pub type ConfigHandle = Rc<RefCell<Config>>;

thread_local! {
    static ACTIVE: RefCell<Option<ConfigHandle>> = const { RefCell::new(None) };
}

/// Make `config` the active instance.
pub fn install(config: Config) -> Result<ConfigHandle, ConfigError> {
    ACTIVE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(ConfigError::SingletonViolation);
        }
        let handle = Rc::new(RefCell::new(config));
        *slot = Some(Rc::clone(&handle));
        Ok(handle)
    })
}

/// The active instance, creating an empty one if none is active.
pub fn get_instance() -> ConfigHandle {
    ACTIVE.with(|slot| {
        Rc::clone(
            slot.borrow_mut()
                .get_or_insert_with(|| Rc::new(RefCell::new(Config::default()))),
        )
    })
}

/// The active instance, if any, without creating one.
pub fn active() -> Option<ConfigHandle> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

pub fn is_active() -> bool {
    ACTIVE.with(|slot| slot.borrow().is_some())
}

/// Drop the active instance. Outstanding handles stay valid but are no
/// longer returned by [`get_instance`].
pub fn clear() {
    ACTIVE.with(|slot| slot.borrow_mut().take());
}
