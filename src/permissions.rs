//! Decides whether a principal may perform a mutation on a target account.
//!
//! The gate is pure: it sees only who is acting and what they are asking to
//! do, never the database.

/// The caller a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated(Actor),
}

/// An authenticated account acting on the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub username: String,
    pub is_staff: bool,
}

impl Principal {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(actor) => Some(actor),
        }
    }

    pub fn require_authenticated(&self) -> Result<&Actor, Denial> {
        self.actor().ok_or(Denial::NotAuthenticated)
    }
}

/// A write the API offers, with the account it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update { target: i32 },
    PartialUpdate { target: i32 },
    Delete { target: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No verified principal where one is required.
    NotAuthenticated,
    /// A verified principal that lacks permission on the target.
    Forbidden,
}

pub fn authorize(principal: &Principal, operation: Operation) -> Result<(), Denial> {
    if operation == Operation::Create {
        return Ok(());
    }

    let actor = principal.require_authenticated()?;

    match operation {
        Operation::Create => Ok(()),
        Operation::Update { target } | Operation::PartialUpdate { target } => {
            if actor.is_staff || actor.id == target {
                Ok(())
            } else {
                Err(Denial::Forbidden)
            }
        }
        // Admins may remove any account but their own; regular users none.
        Operation::Delete { target } => {
            if actor.is_staff && actor.id != target {
                Ok(())
            } else {
                Err(Denial::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_ID: i32 = 1;
    const USER_ID: i32 = 2;
    const OTHER_ID: i32 = 3;

    fn admin() -> Principal {
        Principal::Authenticated(Actor {
            id: ADMIN_ID,
            username: "admin".to_string(),
            is_staff: true,
        })
    }

    fn regular() -> Principal {
        Principal::Authenticated(Actor {
            id: USER_ID,
            username: "regular".to_string(),
            is_staff: false,
        })
    }

    #[test]
    fn anyone_may_create() {
        for principal in [Principal::Anonymous, regular(), admin()] {
            assert_eq!(authorize(&principal, Operation::Create), Ok(()));
        }
    }

    #[test]
    fn anonymous_may_not_mutate() {
        for operation in [
            Operation::Update { target: USER_ID },
            Operation::PartialUpdate { target: USER_ID },
            Operation::Delete { target: USER_ID },
        ] {
            assert_eq!(
                authorize(&Principal::Anonymous, operation),
                Err(Denial::NotAuthenticated)
            );
        }
    }

    #[test]
    fn regular_user_updates_only_self() {
        let principal = regular();
        assert_eq!(authorize(&principal, Operation::Update { target: USER_ID }), Ok(()));
        assert_eq!(
            authorize(&principal, Operation::PartialUpdate { target: USER_ID }),
            Ok(())
        );
        assert_eq!(
            authorize(&principal, Operation::Update { target: OTHER_ID }),
            Err(Denial::Forbidden)
        );
        assert_eq!(
            authorize(&principal, Operation::PartialUpdate { target: ADMIN_ID }),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn regular_user_never_deletes() {
        let principal = regular();
        assert_eq!(
            authorize(&principal, Operation::Delete { target: USER_ID }),
            Err(Denial::Forbidden)
        );
        assert_eq!(
            authorize(&principal, Operation::Delete { target: OTHER_ID }),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn admin_updates_anyone_including_self() {
        let principal = admin();
        for target in [ADMIN_ID, USER_ID, OTHER_ID] {
            assert_eq!(authorize(&principal, Operation::Update { target }), Ok(()));
            assert_eq!(authorize(&principal, Operation::PartialUpdate { target }), Ok(()));
        }
    }

    #[test]
    fn admin_deletes_others_but_not_self() {
        let principal = admin();
        assert_eq!(authorize(&principal, Operation::Delete { target: USER_ID }), Ok(()));
        assert_eq!(
            authorize(&principal, Operation::Delete { target: ADMIN_ID }),
            Err(Denial::Forbidden)
        );
    }
}
