use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Returns the process-wide pool, connecting on first use.
    ///
    /// Later calls reuse the first pool regardless of `database_url`.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = POOL
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await?;
                sqlx::query("SELECT 1").execute(&pool).await?;
                tracing::info!("Database connection pool established");
                Ok::<_, sqlx::Error>(pool)
            })
            .await?
            .clone();

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}
