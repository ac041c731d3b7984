//! Test utilities for arena-based testing.
//!
//! Each test gets its own arena and session, mirroring how an
//! embedder compiles one routine per session.

#[cfg(test)]
pub mod test {
    use super::super::session::CompilationSession;
    use bumpalo::Bump;

    /// Test context that manages arena lifetime for tests.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        /// Create a new test context with default capacity.
        pub fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            Self { arena: Bump::new() }
        }

        /// Create a compilation session using this context's arena.
        ///
        /// The returned session borrows from the TestContext, so the
        /// TestContext must outlive the session.
        pub fn create_session(&self) -> CompilationSession<'_> {
            CompilationSession::new(&self.arena)
        }

        /// Get current memory usage of the arena.
        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }

        /// Run a test with a session.
        pub fn with_session<F, R>(&self, f: F) -> R
        where
            F: FnOnce(&CompilationSession<'_>) -> R,
        {
            let session = self.create_session();
            f(&session)
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Run a test with a temporary arena context.
    pub fn with_test_context<F, R>(f: F) -> R
    where
        F: FnOnce(&TestContext) -> R,
    {
        let ctx = TestContext::new();
        f(&ctx)
    }
}
