//! Authentication orchestrator
//!
//! Composes the challenge registry, signature verifier, token service,
//! key-pool allocator, and identity store into the two public login
//! flows, and enforces the session-exclusivity invariant: at most one
//! identity is marked online system-wide at a time.
//!
//! Every rejection is uniform to the caller. Internal logs may say which
//! check failed; the returned outcome never does.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::{verify_password, Claims, JwtValidator, Role, TokenInput};
use crate::challenge::ChallengeRegistry;
use crate::db::schemas::UserDoc;
use crate::db::IdentityStore;
use crate::keypool::{allocator, KeyPool};
use crate::types::{Result, WicketError};
use crate::wallet;

/// Outcome of the password flow
pub enum PasswordLogin {
    Granted { access_token: String, role: Role },
    Rejected,
}

/// Outcome of the challenge-signature flow
pub enum SignatureLogin {
    Granted { role: Role },
    Rejected,
}

/// Outcome of token confirmation (the session-establishing request)
pub enum SessionConfirmation {
    Confirmed(Claims),
    Rejected,
}

/// Outcome of registration
pub enum Registration {
    Created { address: Option<String> },
    AlreadyExists,
}

/// Input for registration
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Option<Role>,
    pub pwless: bool,
}

pub struct AuthFlowService {
    store: Arc<dyn IdentityStore>,
    challenges: Arc<ChallengeRegistry>,
    jwt: JwtValidator,
    pool: Arc<KeyPool>,
    /// Spans "read used addresses -> pick free entry -> persist" so two
    /// concurrent registrations cannot race to the same pool entry.
    alloc_lock: Mutex<()>,
    /// Serializes the exclusive-online flip across requests.
    session_lock: Mutex<()>,
}

impl AuthFlowService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        challenges: Arc<ChallengeRegistry>,
        jwt: JwtValidator,
        pool: Arc<KeyPool>,
    ) -> Self {
        Self {
            store,
            challenges,
            jwt,
            pool,
            alloc_lock: Mutex::new(()),
            session_lock: Mutex::new(()),
        }
    }

    /// Issue a fresh challenge for an address, invalidating any prior one
    pub fn issue_challenge(&self, address: &str) -> String {
        self.challenges.issue(address)
    }

    /// Password flow: credentials in, token out.
    ///
    /// A missing identity and a wrong password produce the same outcome.
    pub async fn password_login(&self, email: &str, password: &str) -> Result<PasswordLogin> {
        let Some(user) = self.store.find_by_email(email).await? else {
            warn!("Password login rejected - unknown identity: {}", email);
            return Ok(PasswordLogin::Rejected);
        };

        let password_valid = match verify_password(password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Password login rejected - unverifiable hash for {}: {}", email, e);
                false
            }
        };

        if !password_valid {
            warn!("Password login rejected - bad password: {}", email);
            return Ok(PasswordLogin::Rejected);
        }

        let role = Role::from_identifier(email);
        let access_token = self.jwt.generate_token(TokenInput {
            subject: user.email.clone(),
            role,
        })?;

        info!("Password login granted: {} ({})", email, role);
        Ok(PasswordLogin::Granted { access_token, role })
    }

    /// Passwordless flow, step three: verify a signed challenge.
    ///
    /// Requires that the submitted message equals the live challenge for
    /// the address, that signature recovery yields the claimed address,
    /// and that an identity record exists whose DID equals the address.
    pub async fn verify_challenge_signature(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> Result<SignatureLogin> {
        match self.challenges.peek(address) {
            Some(challenge) if challenge == message => {}
            Some(_) => {
                warn!("Signature login rejected - stale challenge for {}", address);
                return Ok(SignatureLogin::Rejected);
            }
            None => {
                warn!("Signature login rejected - no challenge issued for {}", address);
                return Ok(SignatureLogin::Rejected);
            }
        }

        if !wallet::verify_personal_sign(message, signature, address) {
            warn!("Signature login rejected - signature mismatch for {}", address);
            return Ok(SignatureLogin::Rejected);
        }

        let Some(user) = self.store.find_by_did(address).await? else {
            warn!("Signature login rejected - no identity bound to {}", address);
            return Ok(SignatureLogin::Rejected);
        };

        info!("Signature login granted: {} ({})", address, user.role);
        Ok(SignatureLogin::Granted { role: user.role })
    }

    /// Validate a session token and, on success, flip the exclusive
    /// online state to its subject as one atomic unit.
    pub async fn confirm_session(&self, token: &str) -> Result<SessionConfirmation> {
        let validation = self.jwt.verify_token(token);
        if !validation.valid {
            warn!(
                "Session confirmation rejected: {}",
                validation.error.as_deref().unwrap_or("invalid token")
            );
            return Ok(SessionConfirmation::Rejected);
        }
        let Some(claims) = validation.claims else {
            return Ok(SessionConfirmation::Rejected);
        };

        let _guard = self.session_lock.lock().await;
        match self.store.set_exclusive_online(&claims.sub, token).await {
            Ok(()) => {
                info!("Session confirmed for {}", claims.sub);
                Ok(SessionConfirmation::Confirmed(claims))
            }
            Err(WicketError::Auth(reason)) => {
                warn!("Session confirmation rejected: {}", reason);
                Ok(SessionConfirmation::Rejected)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a new identity, allocating a wallet when requested.
    ///
    /// Pool exhaustion surfaces as `NoAvailableAccounts`, an operational
    /// failure distinct from authentication rejection.
    pub async fn register(&self, input: NewIdentity) -> Result<Registration> {
        if self.store.find_by_email(&input.email).await?.is_some() {
            return Ok(Registration::AlreadyExists);
        }

        let password_hash = crate::auth::hash_password(&input.password)?;
        let role = input.role.unwrap_or_else(|| Role::from_identifier(&input.email));
        let mut user = UserDoc::new(
            input.username,
            input.email.clone(),
            input.phone,
            password_hash,
            role,
        );

        let address = if input.pwless {
            let _guard = self.alloc_lock.lock().await;
            let used = self.used_addresses().await?;
            let identity = allocator::allocate(&self.pool, &used)?;
            let address = identity.address.clone();
            user.attach_wallet(identity);
            // Persist inside the critical section; the store's duplicate
            // checks are the backstop, not the mechanism.
            self.store.insert(user).await?;
            Some(address)
        } else {
            self.store.insert(user).await?;
            None
        };

        info!("Registered identity: {}", input.email);
        Ok(Registration::Created { address })
    }

    /// Bind a wallet identity to an existing record. Idempotent: an
    /// already-enabled record keeps its current address.
    pub async fn enable_passwordless(&self, email: &str) -> Result<String> {
        let _guard = self.alloc_lock.lock().await;

        let mut user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| WicketError::Database(format!("No such identity: {email}")))?;

        if let Some(address) = user.blockchain_address.clone() {
            return Ok(address);
        }

        let used = self.used_addresses().await?;
        let identity = allocator::allocate(&self.pool, &used)?;
        let address = identity.address.clone();
        user.attach_wallet(identity);
        self.store.update(&user).await?;

        info!("Enabled passwordless login for {} ({})", email, address);
        Ok(address)
    }

    /// Release a record's wallet binding, clearing address, keys, and DID
    pub async fn disable_passwordless(&self, email: &str) -> Result<()> {
        let mut user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| WicketError::Database(format!("No such identity: {email}")))?;

        user.clear_wallet();
        self.store.update(&user).await?;

        info!("Disabled passwordless login for {}", email);
        Ok(())
    }

    /// Number of identities currently marked online (0 or 1 by invariant)
    pub async fn active_sessions(&self) -> Result<usize> {
        Ok(self
            .store
            .list_all()
            .await?
            .iter()
            .filter(|user| user.is_online)
            .count())
    }

    async fn used_addresses(&self) -> Result<HashSet<String>> {
        Ok(self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter_map(|user| user.blockchain_address)
            .map(|address| address.to_ascii_lowercase())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::challenge::ChallengeRegistry;
    use crate::db::MemoryIdentityStore;
    use crate::keypool::test_pool;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn service_with_pool(pool: KeyPool) -> Arc<AuthFlowService> {
        Arc::new(AuthFlowService::new(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(ChallengeRegistry::new(None)),
            JwtValidator::new("test-secret".into(), 3600).unwrap(),
            Arc::new(pool),
        ))
    }

    fn service() -> Arc<AuthFlowService> {
        service_with_pool(test_pool(4))
    }

    async fn seed_user(svc: &AuthFlowService, email: &str, password: &str) {
        let user = UserDoc::new(
            email.split('@').next().unwrap().into(),
            email.into(),
            String::new(),
            hash_password(password).unwrap(),
            Role::from_identifier(email),
        );
        svc.store.insert(user).await.unwrap();
    }

    fn sign(message: &str, key: &SigningKey) -> String {
        let digest = wallet::hash_personal_message(message);
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[tokio::test]
    async fn test_password_login_grant_and_reject() {
        let svc = service();
        seed_user(&svc, "alice@user.example.org", "hunter2secret").await;

        match svc
            .password_login("alice@user.example.org", "hunter2secret")
            .await
            .unwrap()
        {
            PasswordLogin::Granted { access_token, role } => {
                assert_eq!(role, Role::User);
                assert!(svc.jwt.verify_token(&access_token).valid);
            }
            PasswordLogin::Rejected => panic!("expected grant"),
        }

        // Wrong password and unknown identity are indistinguishable
        assert!(matches!(
            svc.password_login("alice@user.example.org", "wrong")
                .await
                .unwrap(),
            PasswordLogin::Rejected
        ));
        assert!(matches!(
            svc.password_login("nobody@user.example.org", "hunter2secret")
                .await
                .unwrap(),
            PasswordLogin::Rejected
        ));
    }

    #[tokio::test]
    async fn test_challenge_signature_end_to_end() {
        let svc = service();
        let key = SigningKey::random(&mut OsRng);
        let address = wallet::derive_address(&k256::ecdsa::VerifyingKey::from(&key));

        // Identity bound externally: its DID column holds the address
        let mut user = UserDoc::new(
            "wallet-user".into(),
            "w@user.example.org".into(),
            String::new(),
            hash_password("irrelevant-pw").unwrap(),
            Role::User,
        );
        user.did = Some(address.clone());
        user.is_pwless = true;
        svc.store.insert(user).await.unwrap();

        let challenge = svc.issue_challenge(&address);
        let signature = sign(&challenge, &key);

        assert!(matches!(
            svc.verify_challenge_signature(&address, &challenge, &signature)
                .await
                .unwrap(),
            SignatureLogin::Granted { role: Role::User }
        ));

        // A new challenge invalidates the old signature
        let _fresh = svc.issue_challenge(&address);
        assert!(matches!(
            svc.verify_challenge_signature(&address, &challenge, &signature)
                .await
                .unwrap(),
            SignatureLogin::Rejected
        ));
    }

    #[tokio::test]
    async fn test_challenge_signature_rejections_are_uniform() {
        let svc = service();
        let key = SigningKey::random(&mut OsRng);
        let address = wallet::derive_address(&k256::ecdsa::VerifyingKey::from(&key));

        // No challenge issued
        assert!(matches!(
            svc.verify_challenge_signature(&address, "anything", "0x00")
                .await
                .unwrap(),
            SignatureLogin::Rejected
        ));

        // Challenge issued but signed by a different key
        let challenge = svc.issue_challenge(&address);
        let other = SigningKey::random(&mut OsRng);
        let forged = sign(&challenge, &other);
        assert!(matches!(
            svc.verify_challenge_signature(&address, &challenge, &forged)
                .await
                .unwrap(),
            SignatureLogin::Rejected
        ));

        // Good signature but no identity bound to the address
        let signature = sign(&challenge, &key);
        assert!(matches!(
            svc.verify_challenge_signature(&address, &challenge, &signature)
                .await
                .unwrap(),
            SignatureLogin::Rejected
        ));
    }

    #[tokio::test]
    async fn test_concurrent_allocation_yields_distinct_addresses() {
        let pool_size = 8;
        let svc = service_with_pool(test_pool(pool_size));

        let mut handles = Vec::new();
        for i in 0..pool_size {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.register(NewIdentity {
                    username: format!("user{i}"),
                    email: format!("user{i}@user.example.org"),
                    phone: String::new(),
                    password: "a-long-password".into(),
                    role: None,
                    pwless: true,
                })
                .await
                .unwrap()
            }));
        }

        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Registration::Created { address: Some(_) }
            ));
        }

        let all = svc.store.list_all().await.unwrap();
        let mut addresses: Vec<String> = all
            .iter()
            .filter_map(|u| u.blockchain_address.clone())
            .map(|a| a.to_ascii_lowercase())
            .collect();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), pool_size);

        // Pool exhausted: the next allocation fails gracefully
        let result = svc
            .register(NewIdentity {
                username: "late".into(),
                email: "late@user.example.org".into(),
                phone: String::new(),
                password: "a-long-password".into(),
                role: None,
                pwless: true,
            })
            .await;
        assert!(matches!(result, Err(WicketError::NoAvailableAccounts)));
    }

    #[tokio::test]
    async fn test_session_exclusivity_sequential() {
        let svc = service();
        seed_user(&svc, "x@user.example.org", "password-xxxx").await;
        seed_user(&svc, "y@user.example.org", "password-yyyy").await;

        let token_x = svc
            .jwt
            .generate_token(TokenInput {
                subject: "x@user.example.org".into(),
                role: Role::User,
            })
            .unwrap();
        let token_y = svc
            .jwt
            .generate_token(TokenInput {
                subject: "y@user.example.org".into(),
                role: Role::User,
            })
            .unwrap();

        assert!(matches!(
            svc.confirm_session(&token_x).await.unwrap(),
            SessionConfirmation::Confirmed(_)
        ));
        assert!(matches!(
            svc.confirm_session(&token_y).await.unwrap(),
            SessionConfirmation::Confirmed(_)
        ));

        let all = svc.store.list_all().await.unwrap();
        let x = all.iter().find(|u| u.email == "x@user.example.org").unwrap();
        let y = all.iter().find(|u| u.email == "y@user.example.org").unwrap();
        assert!(!x.is_online);
        assert!(y.is_online);
        assert_eq!(y.access_token.as_deref(), Some(token_y.as_str()));
        assert_eq!(svc.active_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_session_exclusivity_concurrent() {
        let svc = service();
        let mut tokens = Vec::new();

        for i in 0..8 {
            let email = format!("c{i}@user.example.org");
            seed_user(&svc, &email, "password-conc").await;
            tokens.push(
                svc.jwt
                    .generate_token(TokenInput {
                        subject: email,
                        role: Role::User,
                    })
                    .unwrap(),
            );
        }

        let mut handles = Vec::new();
        for token in tokens {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(
                async move { svc.confirm_session(&token).await },
            ));
        }
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap().unwrap(),
                SessionConfirmation::Confirmed(_)
            ));
        }

        // Any interleaving must end with exactly one identity online
        assert_eq!(svc.active_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_confirm_session_rejects_bad_tokens() {
        let svc = service();

        assert!(matches!(
            svc.confirm_session("garbage").await.unwrap(),
            SessionConfirmation::Rejected
        ));

        // Valid signature, unknown subject
        let token = svc
            .jwt
            .generate_token(TokenInput {
                subject: "ghost@user.example.org".into(),
                role: Role::User,
            })
            .unwrap();
        assert!(matches!(
            svc.confirm_session(&token).await.unwrap(),
            SessionConfirmation::Rejected
        ));
    }

    #[tokio::test]
    async fn test_enable_disable_passwordless() {
        let svc = service();
        seed_user(&svc, "p@user.example.org", "password-pppp").await;

        let address = svc.enable_passwordless("p@user.example.org").await.unwrap();
        // Idempotent: the same address comes back
        assert_eq!(
            svc.enable_passwordless("p@user.example.org").await.unwrap(),
            address
        );

        let user = svc
            .store
            .find_by_email("p@user.example.org")
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_pwless);
        assert!(user.public_key.is_some());
        assert!(user.did.is_some());

        svc.disable_passwordless("p@user.example.org").await.unwrap();
        let user = svc
            .store
            .find_by_email("p@user.example.org")
            .await
            .unwrap()
            .unwrap();
        // Disabling clears every wallet field
        assert!(!user.is_pwless);
        assert!(user.blockchain_address.is_none());
        assert!(user.public_key.is_none());
        assert!(user.private_key.is_none());
        assert!(user.did.is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let svc = service();
        assert!(matches!(
            svc.register(NewIdentity {
                username: "dup".into(),
                email: "dup@user.example.org".into(),
                phone: String::new(),
                password: "a-long-password".into(),
                role: None,
                pwless: false,
            })
            .await
            .unwrap(),
            Registration::Created { address: None }
        ));

        assert!(matches!(
            svc.register(NewIdentity {
                username: "dup".into(),
                email: "dup@user.example.org".into(),
                phone: String::new(),
                password: "a-long-password".into(),
                role: None,
                pwless: false,
            })
            .await
            .unwrap(),
            Registration::AlreadyExists
        ));
    }
}
