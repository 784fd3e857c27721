//! Index models for the `createIndexes` command.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use typed_builder::TypedBuilder;

use crate::{
    bson::{Bson, Document},
    bson_util,
    collation::Collation,
    error::{Error, Result},
    feature::{Feature, ServerVersion},
    serde_util,
};

/// Specifies the fields and options for an index.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder, Serialize)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IndexModel {
    /// Specifies the index's fields. For each field, specify a key-value pair in which the key is
    /// the name of the field to index and the value is index type.
    #[serde(rename = "key")]
    pub keys: Document,

    /// The options for the index.
    #[serde(flatten)]
    pub options: Option<IndexOptions>,

    /// Extra index fields appended after the typed options. They never replace a field the
    /// options already set.
    #[serde(skip)]
    pub additional_options: Option<Document>,
}

impl IndexModel {
    /// If the client did not specify a name, generate and set it. Otherwise, do nothing.
    pub(crate) fn update_name(&mut self) {
        if self.get_name().is_none() {
            fn format_kv(kv: (&String, &Bson)) -> String {
                if let Bson::String(s) = kv.1 {
                    format!("{}_{}", kv.0, s)
                } else {
                    format!("{}_{}", kv.0, kv.1)
                }
            }
            let key_names: Vec<String> = self.keys.iter().map(format_kv).collect();
            self.options.get_or_insert_with(IndexOptions::default).name =
                Some(key_names.join("_"));
        }
    }

    pub(crate) fn get_name(&self) -> Option<String> {
        self.options.as_ref().and_then(|o| o.name.as_ref()).cloned()
    }

    fn is_wildcard(&self) -> bool {
        self.keys
            .keys()
            .any(|key| key == "$**" || key.ends_with(".$**"))
    }

    /// Builds the entry for the `indexes` array: `key`, `name`, the options in declaration order
    /// and finally the additional options.
    pub(crate) fn to_index_document(
        &self,
        server_version: Option<&ServerVersion>,
    ) -> Result<Document> {
        if self.keys.is_empty() {
            return Err(Error::invalid_argument("index keys must not be empty"));
        }
        let options = self.options.as_ref();
        Feature::COLLATION.check(
            server_version,
            options.is_some_and(|o| o.collation.is_some()),
        )?;
        Feature::PARTIAL_INDEXES.check(
            server_version,
            options.is_some_and(|o| o.partial_filter_expression.is_some()),
        )?;
        Feature::HIDDEN_INDEX.check(server_version, options.is_some_and(|o| o.hidden.is_some()))?;
        Feature::WILDCARD_INDEXES.check(
            server_version,
            self.is_wildcard() || options.is_some_and(|o| o.wildcard_projection.is_some()),
        )?;

        let mut document = bson::to_document(self)?;
        if let Some(ref additional) = self.additional_options {
            bson_util::merge_without_overwrite(&mut document, additional);
        }
        Ok(document)
    }
}

/// These are the valid options for creating an index.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IndexOptions {
    /// Tells the server to build the index in the background and not block other tasks. Ignored
    /// by 4.2+ servers.
    pub background: Option<bool>,

    /// Specifies a length of time in seconds to control how long the server retains documents in
    /// a collection.
    #[serde(
        rename = "expireAfterSeconds",
        default,
        with = "serde_util::duration_option_as_int_seconds"
    )]
    pub expire_after: Option<Duration>,

    /// Specifies a name outside the default generated name.
    pub name: Option<String>,

    /// If true, the index only references documents with the specified field.
    pub sparse: Option<bool>,

    /// Allows users to configure the storage engine on a per-index basis.
    pub storage_engine: Option<Document>,

    /// Forces the index to be unique so the collection will not accept documents where the index
    /// key value matches an existing value in the index.
    pub unique: Option<bool>,

    /// Specify the version number of the index.
    #[serde(rename = "v")]
    pub version: Option<IndexVersion>,

    /// For text indexes, the language that determines the list of stop words.
    #[serde(rename = "default_language")]
    pub default_language: Option<String>,

    /// For `text` indexes, the name of the field in the collection's documents that contains the
    /// override language for the document.
    #[serde(rename = "language_override")]
    pub language_override: Option<String>,

    /// The `text` index version number.
    #[serde(serialize_with = "serde_util::serialize_u32_option_as_i32")]
    pub text_index_version: Option<u32>,

    /// For `text` indexes, the significance of each field relative to the other indexed fields.
    pub weights: Option<Document>,

    /// The `2dsphere` index version number.
    #[serde(
        rename = "2dsphereIndexVersion",
        serialize_with = "serde_util::serialize_u32_option_as_i32"
    )]
    pub sphere_2d_index_version: Option<u32>,

    /// For `2d` indexes, the number of precision of the stored geohash value of the location
    /// data.
    #[serde(serialize_with = "serde_util::serialize_u32_option_as_i32")]
    pub bits: Option<u32>,

    /// For `2d` indexes, the upper inclusive boundary for the longitude and latitude values.
    pub max: Option<f64>,

    /// For `2d` indexes, the lower inclusive boundary for the longitude and latitude values.
    pub min: Option<f64>,

    /// For `geoHaystack` indexes, the number of units within which to group the location values.
    #[serde(serialize_with = "serde_util::serialize_u32_option_as_i32")]
    pub bucket_size: Option<u32>,

    /// If specified, the index only references documents that match the filter expression.
    pub partial_filter_expression: Option<Document>,

    /// Specifies the collation for the index.
    pub collation: Option<Collation>,

    /// Allows users to include or exclude specific field paths from a wildcard index.
    pub wildcard_projection: Option<Document>,

    /// A flag that determines whether the index is hidden from the query planner.
    pub hidden: Option<bool>,
}

/// The version of the index. Version 0 Indexes are disallowed as of MongoDB 3.2.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum IndexVersion {
    /// Default index version for MongoDB 2.0 - 3.2.
    V1,

    /// Default index version for MongoDB >= 3.4.
    V2,

    /// Specify any other index version.
    Custom(u32),
}

impl Serialize for IndexVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            IndexVersion::V1 => serializer.serialize_i32(1),
            IndexVersion::V2 => serializer.serialize_i32(2),
            IndexVersion::Custom(i) => bson::serde_helpers::serialize_u32_as_i32(i, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for IndexVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match i32::deserialize(deserializer)? {
            1 => Ok(IndexVersion::V1),
            2 => Ok(IndexVersion::V2),
            i => Ok(IndexVersion::Custom(
                i.try_into().map_err(serde::de::Error::custom)?,
            )),
        }
    }
}
