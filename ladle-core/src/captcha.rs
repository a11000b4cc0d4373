use async_trait::async_trait;

/// Seam to the external captcha service, consulted before any payment capture
/// when checkout protection is enabled.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> bool;
}

/// Verifier used when captcha protection is switched off.
pub struct DisabledCaptcha;

#[async_trait]
impl CaptchaVerifier for DisabledCaptcha {
    async fn verify(&self, _token: &str) -> bool {
        true
    }
}

/// Test verifier with a fixed answer.
pub struct MockCaptcha {
    pub accept: bool,
}

#[async_trait]
impl CaptchaVerifier for MockCaptcha {
    async fn verify(&self, token: &str) -> bool {
        tracing::debug!("Verifying captcha token: {} chars", token.len());
        self.accept
    }
}
