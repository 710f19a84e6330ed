use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Schema,
    Statement,
};
use tracing::{debug, info};

use crate::models::entity::{resources, users};

pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if database_url.starts_with("sqlite:") && database_url.contains(":memory:") {
        // 内存 SQLite 每个连接各自一份数据，只能使用单连接
        options.max_connections(1).min_connections(1);
    }

    info!("正在使用Sea-ORM连接数据库");
    let db = Database::connect(options).await?;

    create_tables_if_not_exists(&db).await?;

    Ok(db)
}

pub async fn create_tables_if_not_exists(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("检查并创建数据库表...");

    // users 表需要先于 resources 表创建
    let mut create_users_table = schema.create_table_from_entity(users::Entity);
    create_users_table.if_not_exists();
    db.execute(backend.build(&create_users_table)).await?;
    info!("users表检查完成");

    let mut create_resources_table = schema.create_table_from_entity(resources::Entity);
    create_resources_table.if_not_exists();
    db.execute(backend.build(&create_resources_table)).await?;
    info!("resources表检查完成");

    // 四种访问模式的二级索引
    let mut indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_resources_category_subject ON resources(category, subject)",
        "CREATE INDEX IF NOT EXISTS idx_resources_uploaded_by ON resources(uploaded_by)",
        "CREATE INDEX IF NOT EXISTS idx_resources_approved_public ON resources(is_approved, is_public)",
    ];
    match backend {
        DatabaseBackend::Postgres => {
            indexes.push("CREATE INDEX IF NOT EXISTS idx_resources_tags ON resources USING GIN ((tags::jsonb))");
        }
        _ => debug!("当前数据库不支持GIN索引，跳过tags索引"),
    }

    for index_sql in indexes {
        let statement = Statement::from_string(backend, index_sql.to_string());
        db.execute(statement).await?;
    }

    info!("数据库表和索引初始化完成");

    Ok(())
}
