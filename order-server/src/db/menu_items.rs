use shared::order::Station;
use sqlx::SqliteExecutor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MenuItemRow {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub station: Option<String>,
    pub created_at: i64,
}

pub struct CreateMenuItem<'a> {
    pub name: &'a str,
    pub price: f64,
    pub station: Option<Station>,
    pub now: i64,
}

pub async fn create(
    db: impl SqliteExecutor<'_>,
    item: &CreateMenuItem<'_>,
) -> Result<MenuItemRow, sqlx::Error> {
    sqlx::query_as::<_, MenuItemRow>(
        "INSERT INTO menu_items (name, price, station, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, name, price, station, created_at",
    )
    .bind(item.name)
    .bind(item.price)
    .bind(item.station.map(|s| s.as_str()))
    .bind(item.now)
    .fetch_one(db)
    .await
}

pub async fn find(db: impl SqliteExecutor<'_>, id: i64) -> Result<Option<MenuItemRow>, sqlx::Error> {
    sqlx::query_as::<_, MenuItemRow>(
        "SELECT id, name, price, station, created_at FROM menu_items WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}
