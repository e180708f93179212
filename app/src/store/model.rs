use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::{
    deserialize::FromSql,
    prelude::*,
    serialize::{IsNull, ToSql},
    sql_types::Text,
    sqlite::{Sqlite, SqliteValue},
    AsExpression, FromSqlRow,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Queryable, Identifiable, Selectable, Debug, PartialEq, Clone, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[diesel(table_name = super::schema::streamers, primary_key(id))]
pub struct Streamer {
    pub id: i32,
    pub name: String,
    pub platform: Platform,
    /// Channel page URL, the only durable link to the external channel
    pub platform_url: String,
    pub live: bool,
    pub title: Option<String>,
    pub game: Option<String>,
    pub linked_account: Option<String>,
    pub schedule: Option<Schedule>,
    pub one_time_events: Option<OneTimeEvents>,
    pub assigned_user: Option<String>,
    /// Cached platform channel id, filled in once resolved
    pub channel_id: Option<String>,
}

#[derive(Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = super::schema::streamers)]
pub struct NewStreamer {
    pub name: String,
    pub platform: Platform,
    pub platform_url: String,
    pub live: bool,
    pub title: Option<String>,
    pub game: Option<String>,
    pub linked_account: Option<String>,
    pub schedule: Option<Schedule>,
    pub one_time_events: Option<OneTimeEvents>,
    pub assigned_user: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    FromSqlRow,
    AsExpression,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Twitch,
    Youtube,
    Other,
}

#[derive(
    Queryable, Identifiable, Selectable, Insertable, Debug, PartialEq, Clone, Serialize,
    Deserialize, utoipa::ToSchema,
)]
#[diesel(table_name = super::schema::media, primary_key(id))]
pub struct MediaItem {
    /// Natural text key, `yt-<videoId>` for bridge-created rows
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    pub thumbnail: String,
    pub url: String,
    pub creator: String,
    /// RFC3339 creation date
    pub date: String,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    FromSqlRow,
    AsExpression,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Video,
    Clip,
    Stream,
    Guide,
    Short,
}

#[derive(
    Queryable, Identifiable, Selectable, Debug, PartialEq, Clone, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[diesel(table_name = super::schema::events, primary_key(id))]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: EventStatus,
    pub details: String,
    pub participants: Participants,
    pub scoreboard: Option<Scoreboard>,
    pub related_media: Option<MediaRefs>,
    pub images: Images,
}

#[derive(Insertable, Debug, PartialEq, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[diesel(table_name = super::schema::events)]
pub struct NewEvent {
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: EventStatus,
    pub details: String,
    pub participants: Participants,
    pub scoreboard: Option<Scoreboard>,
    pub related_media: Option<MediaRefs>,
    pub images: Images,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    FromSqlRow,
    AsExpression,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Live,
    Past,
}

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct Schedule(pub Vec<ScheduleSlot>);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, utoipa::ToSchema)]
pub struct ScheduleSlot {
    pub day: String,
    pub start: String,
    pub end: String,
}

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct OneTimeEvents(pub Vec<OneTimeEvent>);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, utoipa::ToSchema)]
pub struct OneTimeEvent {
    pub title: String,
    pub at: String,
}

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct Participants(pub Vec<String>);

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct Scoreboard(pub Vec<ScoreRow>);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, utoipa::ToSchema)]
pub struct ScoreRow {
    pub name: String,
    pub score: i64,
}

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct MediaRefs(pub Vec<String>);

#[derive(
    Debug, Clone, Deserialize, Serialize, PartialEq, FromSqlRow, AsExpression, utoipa::ToSchema,
)]
#[diesel(sql_type = Text)]
pub struct Images(pub Vec<String>);

#[derive(
    Queryable, Identifiable, Selectable, Insertable, Debug, PartialEq, Clone, Serialize,
    Deserialize, utoipa::ToSchema,
)]
#[diesel(table_name = super::schema::config, primary_key(key))]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

pub fn from_sql<T: DeserializeOwned>(
    bytes: SqliteValue<'_, '_, '_>,
) -> diesel::deserialize::Result<T> {
    let s: String = FromSql::<Text, Sqlite>::from_sql(bytes)?;
    Ok(serde_json::from_str(&s)?)
}

pub fn to_sql<T: Serialize>(
    data: &T,
    out: &mut diesel::serialize::Output<'_, '_, Sqlite>,
) -> diesel::serialize::Result {
    out.set_value(serde_json::to_string(&data)?);
    Ok(IsNull::No)
}

impl FromSql<Text, Sqlite> for Platform {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        let s: String = FromSql::<Text, Sqlite>::from_sql(bytes)?;
        Ok(Platform::from_str(&s)?)
    }
}

impl ToSql<Text, Sqlite> for Platform {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for MediaKind {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        let s: String = FromSql::<Text, Sqlite>::from_sql(bytes)?;
        Ok(MediaKind::from_str(&s)?)
    }
}

impl ToSql<Text, Sqlite> for MediaKind {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for EventStatus {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        let s: String = FromSql::<Text, Sqlite>::from_sql(bytes)?;
        Ok(EventStatus::from_str(&s)?)
    }
}

impl ToSql<Text, Sqlite> for EventStatus {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Schedule {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for Schedule {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}

impl FromSql<Text, Sqlite> for OneTimeEvents {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for OneTimeEvents {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}

impl FromSql<Text, Sqlite> for Participants {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for Participants {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}

impl FromSql<Text, Sqlite> for Scoreboard {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for Scoreboard {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}

impl FromSql<Text, Sqlite> for MediaRefs {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for MediaRefs {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}

impl FromSql<Text, Sqlite> for Images {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        from_sql(bytes)
    }
}

impl ToSql<Text, Sqlite> for Images {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        to_sql(self, out)
    }
}
