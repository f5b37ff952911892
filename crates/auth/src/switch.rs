//! Scoped temporary identity override.
//!
//! A switch frame overrides the effective principal for the current logical
//! call chain only. Frames live in a thread-local stack keyed by login type,
//! so concurrent requests on other threads never observe each other's
//! switches, and restoration is last-in-first-out on every exit path
//! (the guard restores on drop, panics and early returns included).

use std::cell::RefCell;
use std::marker::PhantomData;

use vendra_core::{LoginId, LoginType};

thread_local! {
    static SWITCH_STACK: RefCell<Vec<(LoginType, LoginId)>> = const { RefCell::new(Vec::new()) };
}

/// Active switch frame. Dropping it restores the previous identity.
#[must_use = "dropping the guard ends the switch"]
pub struct SwitchGuard {
    login_type: LoginType,
    // Frames are thread-scoped; the guard must not cross threads.
    _not_send: PhantomData<*const ()>,
}

impl Drop for SwitchGuard {
    fn drop(&mut self) {
        SWITCH_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let top = stack.pop();
            debug_assert!(
                top.as_ref().is_some_and(|(ty, _)| *ty == self.login_type),
                "switch frames must unwind in LIFO order"
            );
        });
    }
}

/// Push a switch frame for `login_type`.
pub fn switch_to(login_type: &LoginType, login_id: LoginId) -> SwitchGuard {
    SWITCH_STACK.with(|stack| {
        stack.borrow_mut().push((login_type.clone(), login_id));
    });
    SwitchGuard {
        login_type: login_type.clone(),
        _not_send: PhantomData,
    }
}

/// Innermost switched identity for `login_type`, if any.
pub fn current(login_type: &LoginType) -> Option<LoginId> {
    SWITCH_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|(ty, _)| ty == login_type)
            .map(|(_, id)| id.clone())
    })
}

pub fn is_switched(login_type: &LoginType) -> bool {
    current(login_type).is_some()
}

/// Run `operation` with the identity switched, restoring unconditionally.
pub fn with_switched_identity<R>(
    login_type: &LoginType,
    login_id: LoginId,
    operation: impl FnOnce() -> R,
) -> R {
    let _guard = switch_to(login_type, login_id);
    operation()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> LoginType {
        LoginType::new("member")
    }

    #[test]
    fn switch_restores_on_scope_exit() {
        let ty = member();
        assert!(!is_switched(&ty));
        {
            let _guard = switch_to(&ty, LoginId::Int(2));
            assert_eq!(current(&ty), Some(LoginId::Int(2)));
        }
        assert!(!is_switched(&ty));
    }

    #[test]
    fn nesting_unwinds_lifo() {
        let ty = member();
        let _outer = switch_to(&ty, LoginId::Int(1));
        {
            let _inner = switch_to(&ty, LoginId::Int(2));
            assert_eq!(current(&ty), Some(LoginId::Int(2)));
        }
        assert_eq!(current(&ty), Some(LoginId::Int(1)));
    }

    #[test]
    fn restores_when_operation_panics() {
        let ty = member();
        let result = std::panic::catch_unwind(|| {
            with_switched_identity(&member(), LoginId::Int(9), || {
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert!(!is_switched(&ty));
    }

    #[test]
    fn types_are_independent() {
        let member = member();
        let admin = LoginType::new("admin");
        let _guard = switch_to(&member, LoginId::Int(5));
        assert!(!is_switched(&admin));
        assert!(is_switched(&member));
    }

    #[test]
    fn other_threads_are_unaffected() {
        let ty = member();
        let _guard = switch_to(&ty, LoginId::Int(5));
        let seen = std::thread::spawn(|| is_switched(&LoginType::new("member")))
            .join()
            .unwrap();
        assert!(!seen);
    }
}
