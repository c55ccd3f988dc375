use tokio_postgres::NoTls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let conn_str = std::env::var("PG_ADMIN_CONN")
        .unwrap_or_else(|_| "host=127.0.0.1 user=postgres dbname=postgres".into());

    println!("Connecting to Postgres maintenance database...");

    let (client, connection) = tokio_postgres::connect(&conn_str, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "review_platform".into());

    let valid_name = !db_name.is_empty()
        && db_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        eprintln!("Refusing to create database: invalid name '{}'.", db_name);
        std::process::exit(2);
    }

    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?
        .is_some();

    if exists {
        println!("Database '{}' already exists, nothing to do.", db_name);
        return Ok(());
    }

    client
        .execute(format!("CREATE DATABASE \"{}\"", db_name).as_str(), &[])
        .await?;
    println!(
        "Database '{}' created. Migrations run on the next API start.",
        db_name
    );

    Ok(())
}
