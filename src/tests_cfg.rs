//! Entities used by the unit tests: a disc with many tracks, a track
//! belonging to its disc.

use uuid::Uuid;

use crate::error::Error;
use crate::model::{Entity, Model};
use crate::relation::{Relation, RelationSlot};
use crate::store::Columns;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Disc {
    pub model: Model,
    pub name: String,
    pub tracks: RelationSlot<Track>,
}

impl Entity for Disc {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn table() -> &'static str {
        "discs"
    }

    fn column_names() -> &'static [&'static str] {
        &["name"]
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }

    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Disc {
            model: Model::read(cols)?,
            name: cols.take()?,
            ..Default::default()
        })
    }
}

impl Disc {
    pub fn tracks(&self) -> Relation<'_, Disc, Track> {
        Relation::has_many(self, "disc_id", "tracks", |t| Some(t.disc_id), |d| &d.tracks)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub model: Model,
    pub title: String,
    pub plays: i64,
    pub disc_id: Uuid,
    pub disc: RelationSlot<Disc>,
}

impl Entity for Track {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn table() -> &'static str {
        "tracks"
    }

    fn column_names() -> &'static [&'static str] {
        &["title", "plays", "disc_id"]
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.plays.into(),
            self.disc_id.into(),
        ]
    }

    fn from_row(cols: &mut Columns<'_>) -> Result<Self, Error> {
        Ok(Track {
            model: Model::read(cols)?,
            title: cols.take()?,
            plays: cols.take()?,
            disc_id: cols.take()?,
            ..Default::default()
        })
    }
}

impl Track {
    pub fn disc(&self) -> Relation<'_, Track, Disc> {
        Relation::belongs_to(self, "disc_id", |t| Some(t.disc_id), "disc", |t| &t.disc)
    }
}
