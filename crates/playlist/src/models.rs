use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::time::Duration;
use trove_vfs::Identifier;

/// One row of the playlist: what to play and how to label it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistItem {
    pub location: Identifier,
    pub title: String,
    pub author: String,
    pub duration: Duration,
}

/// A stored item together with its row id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredItem {
    pub id: i64,
    pub item: PlaylistItem,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub(crate) id: i64,
    pub(crate) location: String,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) duration_ms: i64,
}

impl TryFrom<ItemRow> for StoredItem {
    type Error = Error;
    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let location = Identifier::parse(&row.location).or_raise(|| ErrorKind::InvalidData("location"))?;
        let duration_ms = u64::try_from(row.duration_ms).or_raise(|| ErrorKind::InvalidData("duration"))?;
        Ok(Self {
            id: row.id,
            item: PlaylistItem {
                location,
                title: row.title,
                author: row.author,
                duration: Duration::from_millis(duration_ms),
            },
        })
    }
}

pub(crate) fn duration_ms(duration: Duration) -> Result<i64, Error> {
    i64::try_from(duration.as_millis()).or_raise(|| ErrorKind::InvalidData("duration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let row = ItemRow {
            id: 7,
            location: "file:///music/pack.zip#%231".to_string(),
            title: "Intro".to_string(),
            author: "Someone".to_string(),
            duration_ms: 153_000,
        };
        let stored = StoredItem::try_from(row).unwrap();
        assert_eq!(stored.id, 7);
        assert_eq!(stored.item.location.subpath(), ["#1"]);
        assert_eq!(stored.item.duration, Duration::from_secs(153));
    }

    #[test]
    fn test_invalid_row() {
        let row = ItemRow {
            id: 1,
            location: "not a location".to_string(),
            title: String::new(),
            author: String::new(),
            duration_ms: 0,
        };
        assert!(StoredItem::try_from(row).is_err());
        let row = ItemRow {
            id: 1,
            location: "file:///a.mod".to_string(),
            title: String::new(),
            author: String::new(),
            duration_ms: -5,
        };
        assert!(StoredItem::try_from(row).is_err());
    }
}
