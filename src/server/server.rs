use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{self, Settings};
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let store = &settings.store;

        let (accounts, refresh_store, pool): (
            Arc<dyn AccountDirectory>,
            Arc<dyn RefreshTokenStore>,
            Option<Pool<MySql>>,
        ) = match store.backend.as_str() {
            "memory" => {
                warn!("memory store backend: accounts and sessions are lost on restart");
                let accounts: Arc<dyn AccountDirectory> = Arc::new(MemoryAccountDirectory::new());
                let refresh_store: Arc<dyn RefreshTokenStore> =
                    Arc::new(MemoryRefreshTokenStore::new());
                (accounts, refresh_store, None)
            }
            "mysql" => {
                let pool = Self::connect_mysql(settings).await?;
                let accounts: Arc<dyn AccountDirectory> =
                    Arc::new(MySqlAccountDirectory::new(pool.clone()));
                let refresh_store: Arc<dyn RefreshTokenStore> =
                    Arc::new(MySqlRefreshTokenStore::new(pool.clone()));
                (accounts, refresh_store, Some(pool))
            }
            "redis" => {
                let pool = Self::connect_mysql(settings).await?;
                let dsn = store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.redis_dsn is not set"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                let accounts: Arc<dyn AccountDirectory> =
                    Arc::new(MySqlAccountDirectory::new(pool.clone()));
                let refresh_store: Arc<dyn RefreshTokenStore> = Arc::new(RedisRefreshTokenStore::new(
                    redis_manager,
                    format!("{}:auth", store.key_prefix),
                    settings.auth.refresh_ttl(),
                ));
                (accounts, refresh_store, Some(pool))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let server = Self::assemble(&settings.auth, accounts, refresh_store, pool);
        info!(backend = %store.backend, "server started");
        Ok(server)
    }

    /// Everything in process memory. Used by the demo binary and tests.
    pub fn in_memory(auth: &settings::Auth) -> Self {
        Self::assemble(
            auth,
            Arc::new(MemoryAccountDirectory::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
            None,
        )
    }

    fn assemble(
        auth: &settings::Auth,
        accounts: Arc<dyn AccountDirectory>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        pool: Option<Pool<MySql>>,
    ) -> Self {
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::new(auth.jwt_config()));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            accounts,
            credential_hasher,
            refresh_store,
            token_codec,
            auth.revoke_on_reuse,
        ));

        Self { auth_service, pool }
    }

    async fn connect_mysql(settings: &Settings) -> anyhow::Result<Pool<MySql>> {
        let dsn = settings
            .store
            .mysql_dsn
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("store.mysql_dsn is not set"))?;
        let pool = Pool::<MySql>::connect(dsn).await?;
        Ok(pool)
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
