//! Sleeper port - injected delays for retry loops.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeper_is_object_safe() {
        fn _accepts_dyn(_sleeper: &dyn Sleeper) {}
    }
}
