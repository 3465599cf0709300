use crate::authentication::AuthUser;
use crate::errors::RequestError;
use crate::models::{Comment, Post};

/// Something owned by exactly one user.
pub trait Authored {
    fn author_id(&self) -> i64;
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

/// Reads are open to everyone; writes belong to the author alone.
pub fn ensure_author<T: Authored>(user: &AuthUser, object: &T) -> Result<(), RequestError> {
    if object.author_id() == user.id {
        Ok(())
    } else {
        tracing::debug!(
            user_id = user.id,
            author_id = object.author_id(),
            "write refused to non-author"
        );
        Err(RequestError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note(i64);

    impl Authored for Note {
        fn author_id(&self) -> i64 {
            self.0
        }
    }

    fn user(id: i64) -> AuthUser {
        AuthUser {
            id,
            username: format!("user{id}"),
        }
    }

    #[test]
    fn author_may_write() {
        assert!(ensure_author(&user(1), &Note(1)).is_ok());
    }

    #[test]
    fn others_are_forbidden() {
        assert!(matches!(
            ensure_author(&user(2), &Note(1)),
            Err(RequestError::Forbidden)
        ));
    }
}
