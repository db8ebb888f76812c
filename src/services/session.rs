use tokio::sync::watch;

use crate::collaborators::Session;

/// Broadcast holder for the current authenticated session. Consumers that
/// need to react to sign-in/sign-out subscribe to the channel instead of
/// polling.
pub struct SessionContext {
    tx: watch::Sender<Option<Session>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, session: Session) {
        // send_replace never fails even with no receivers
        self.tx.send_replace(Some(session));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AuthUser;

    fn session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: "r".to_string(),
            expires_in: 3600,
            user: AuthUser {
                id: "u1".to_string(),
                email: Some("a@example.com".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn set_and_clear_are_observable() {
        let ctx = SessionContext::new();
        assert!(ctx.current().is_none());

        let mut rx = ctx.subscribe();
        ctx.set(session("t1"));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().as_ref().map(|s| s.access_token.clone()),
            Some("t1".to_string())
        );

        ctx.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(ctx.current().is_none());
    }
}
