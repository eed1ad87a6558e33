use sqlx::postgres::PgPool;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;

    println!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    for table in ["places", "place_suggestions"] {
        println!("Testing if {} table exists...", table);
        let count = sqlx::query_as::<_, (i64,)>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await;

        match count {
            Ok((rows,)) => println!("✅ {} table EXISTS ({} rows)", table, rows),
            Err(e) => {
                println!("❌ {} table NOT FOUND: {}", table, e);
                println!("Checking what tables exist...");
                let tables = sqlx::query_as::<_, (String,)>(
                    "SELECT tablename FROM pg_tables WHERE schemaname = 'public'",
                )
                .fetch_all(&pool)
                .await?;

                println!("Available tables:");
                for (name,) in tables {
                    println!("  - {}", name);
                }
            }
        }
    }

    // Rows the map can actually draw
    let located = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM places WHERE latitude IS NOT NULL AND longitude IS NOT NULL",
    )
    .fetch_one(&pool)
    .await;
    match located {
        Ok((rows,)) => println!("📍 {} places have coordinates", rows),
        Err(e) => println!("❌ Error counting located places: {}", e),
    }

    println!("\nTesting _sqlx_migrations table...");
    let migrations = sqlx::query_as::<_, (i64, String, bool)>(
        "SELECT version, description, success FROM _sqlx_migrations ORDER BY version DESC",
    )
    .fetch_all(&pool)
    .await;

    match migrations {
        Ok(migrations) => {
            println!("✅ Migrations:");
            for (version, description, success) in migrations {
                println!("  - {} {} (Applied: {})", version, description, success);
            }
        }
        Err(e) => println!("❌ Error querying _sqlx_migrations: {}", e),
    }

    Ok(())
}
