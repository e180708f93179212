use std::thread::spawn;

use diesel::{
    result::DatabaseErrorKind, Connection, ConnectionError, ExpressionMethods, QueryDsl,
    RunQueryDsl, SelectableHelper, SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use flume::{Receiver, Sender};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, trace};

use self::model::{ConfigEntry, Event, MediaItem, NewEvent, NewStreamer, Platform, Streamer};

pub mod model;
mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub struct StoreWrapper(pub Mutex<Option<Store>>);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store not initialized")]
    NotInitialized,
    #[error("Could not connect to database: {0}")]
    ConnectionError(ConnectionError),
    #[error("SQL execute error: {0} at {1}")]
    SqlError(diesel::result::Error, String),
    #[error("Could not initialize database: {0}")]
    DbInit(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    fn from_diesel_error(err: diesel::result::Error, context: String) -> StoreError {
        StoreError::SqlError(err, context)
    }
}

impl StoreWrapper {
    pub fn new(store: Store) -> StoreWrapper {
        StoreWrapper(Mutex::new(Some(store)))
    }

    pub async fn execute<F, R>(&self, func: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Store) -> Result<R, StoreError>,
    {
        if let Some(store) = self.0.lock().await.as_mut() {
            func(store)
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

pub struct Store {
    conn: Option<SqliteConnection>,
}

/// Deferred write shipped to the store's writer thread.
pub type Request = Box<dyn Fn(&mut Store) -> Result<(), StoreError> + Send>;

impl Store {
    /// Opens the database, runs pending migrations and spawns the writer
    /// thread for fire-and-forget requests. Returns the call-and-wait handle
    /// plus the writer channel.
    pub fn new(url: &str) -> Result<(Store, Sender<Request>), StoreError> {
        let mut conn = SqliteConnection::establish(url)?;
        let conn_thread = SqliteConnection::establish(url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(StoreError::DbInit)?;

        let (tx, rx) = flume::unbounded();
        spawn(move || {
            Store::run(
                Store {
                    conn: Some(conn_thread),
                },
                rx,
            );
        });
        Ok((Store { conn: Some(conn) }, tx))
    }

    pub fn run(mut self, rx: Receiver<Request>) {
        while let Ok(data) = rx.recv() {
            trace!("got store request");
            if let Err(err) = data(&mut self) {
                error!("{err:#?}");
            }
        }
    }

    pub fn insert_streamer(&mut self, streamer: &NewStreamer) -> Result<bool, StoreError> {
        let res = diesel::insert_into(schema::streamers::table)
            .values(streamer)
            .execute(self.conn.as_mut().unwrap());
        if let Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) =
            res
        {
            return Ok(false);
        }
        res.map_err(|err| {
            StoreError::from_diesel_error(err, format!("Insert streamer {}", streamer.name))
        })?;
        Ok(true)
    }

    pub fn remove_streamer(&mut self, by_name: &str) -> Result<bool, StoreError> {
        use schema::streamers::dsl::*;
        let affected = diesel::delete(streamers.filter(name.eq(by_name)))
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Delete streamer {by_name}"))
            })?;
        Ok(affected > 0)
    }

    pub fn streamer_by_name(&mut self, by_name: &str) -> Result<Option<Streamer>, StoreError> {
        use schema::streamers::dsl::*;
        let res = streamers
            .filter(name.eq(by_name))
            .select(Streamer::as_select())
            .first(self.conn.as_mut().unwrap());
        match res {
            Ok(res) => Ok(Some(res)),
            Err(err) => match err {
                diesel::result::Error::NotFound => Ok(None),
                err => Err(StoreError::from_diesel_error(
                    err,
                    format!("Get streamer {by_name}"),
                )),
            },
        }
    }

    pub fn streamers(&mut self) -> Result<Vec<Streamer>, StoreError> {
        use schema::streamers::dsl::*;
        streamers
            .select(Streamer::as_select())
            .order(name.asc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List streamers")))
    }

    pub fn streamers_on_platform(&mut self, on: Platform) -> Result<Vec<Streamer>, StoreError> {
        use schema::streamers::dsl::*;
        streamers
            .filter(platform.eq(on))
            .select(Streamer::as_select())
            .order(id.asc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List {on} streamers")))
    }

    pub fn live_streamers(&mut self) -> Result<Vec<Streamer>, StoreError> {
        use schema::streamers::dsl::*;
        streamers
            .filter(live.eq(true))
            .select(Streamer::as_select())
            .order(name.asc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List live streamers")))
    }

    pub fn set_streamer_live(
        &mut self,
        streamer_id: i32,
        is_live: bool,
        new_title: &str,
    ) -> Result<(), StoreError> {
        use schema::streamers::dsl::*;
        diesel::update(streamers.filter(id.eq(streamer_id)))
            .set((live.eq(is_live), title.eq(new_title)))
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Set streamer {streamer_id} live"))
            })?;
        Ok(())
    }

    pub fn set_channel_id(&mut self, streamer_id: i32, resolved: &str) -> Result<(), StoreError> {
        use schema::streamers::dsl::*;
        diesel::update(streamers.filter(id.eq(streamer_id)))
            .set(channel_id.eq(resolved))
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(
                    err,
                    format!("Set channel id of streamer {streamer_id}"),
                )
            })?;
        Ok(())
    }

    /// Insert-or-ignore keyed on the media id. Returns false when a row with
    /// the same id already exists, leaving the existing row untouched.
    pub fn insert_media(&mut self, item: &MediaItem) -> Result<bool, StoreError> {
        let res = diesel::insert_into(schema::media::table)
            .values(item)
            .execute(self.conn.as_mut().unwrap());
        if let Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) =
            res
        {
            return Ok(false);
        }
        res.map_err(|err| {
            StoreError::from_diesel_error(err, format!("Insert media {}", item.id))
        })?;
        Ok(true)
    }

    pub fn media(&mut self) -> Result<Vec<MediaItem>, StoreError> {
        use schema::media::dsl::*;
        media
            .select(MediaItem::as_select())
            .order(date.desc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List media")))
    }

    pub fn insert_event(&mut self, event: &NewEvent) -> Result<(), StoreError> {
        diesel::insert_into(schema::events::table)
            .values(event)
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Insert event {}", event.title))
            })?;
        Ok(())
    }

    pub fn remove_event(&mut self, event_id: i32) -> Result<bool, StoreError> {
        use schema::events::dsl::*;
        let affected = diesel::delete(events.filter(id.eq(event_id)))
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Delete event {event_id}"))
            })?;
        Ok(affected > 0)
    }

    pub fn events(&mut self) -> Result<Vec<Event>, StoreError> {
        use schema::events::dsl::*;
        events
            .select(Event::as_select())
            .order(starts_at.asc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List events")))
    }

    pub fn config_entries(&mut self) -> Result<Vec<ConfigEntry>, StoreError> {
        use schema::config::dsl::*;
        config
            .select(ConfigEntry::as_select())
            .order(key.asc())
            .load(self.conn.as_mut().unwrap())
            .map_err(|err| StoreError::from_diesel_error(err, format!("List config entries")))
    }

    pub fn get_config_value(&mut self, for_key: &str) -> Result<Option<String>, StoreError> {
        use schema::config::dsl::*;
        let res = config
            .filter(key.eq(for_key))
            .select(value)
            .first(self.conn.as_mut().unwrap());
        match res {
            Ok(res) => Ok(Some(res)),
            Err(err) => match err {
                diesel::result::Error::NotFound => Ok(None),
                err => Err(StoreError::from_diesel_error(
                    err,
                    format!("Get config entry {for_key}"),
                )),
            },
        }
    }

    pub fn set_config_value(&mut self, for_key: &str, new_value: &str) -> Result<(), StoreError> {
        diesel::replace_into(schema::config::table)
            .values(&ConfigEntry {
                key: for_key.to_owned(),
                value: new_value.to_owned(),
            })
            .execute(self.conn.as_mut().unwrap())
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Set config entry {for_key}"))
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for StoreWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreWrapper").finish()
    }
}

impl From<ConnectionError> for StoreError {
    fn from(value: ConnectionError) -> Self {
        StoreError::ConnectionError(value)
    }
}
