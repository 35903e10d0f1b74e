// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Musicological tags for sections and phrases.
//!
//! Every tag group is a fixed struct of booleans that default to `false`,
//! so documents written before a tag existed load with it unset. Section
//! records additionally pass through [`clean_up_section_categorization`],
//! which migrates renamed keys and derives the top-level label.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, Result};

macro_rules! tag_group {
    ($(#[$meta:meta])* $name:ident { $($field:ident => $key:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name {
            $(
                #[serde(rename = $key, default)]
                pub $field: bool,
            )+
        }

        impl $name {
            /// True when any tag in the group is set
            pub fn any(&self) -> bool {
                false $(|| self.$field)+
            }
        }
    };
}

tag_group!(PreChizAlapTags { pre_chiz_alap => "Pre-Chiz Alap" });

tag_group!(AlapTags {
    alap => "Alap",
    jor => "Jor",
    alap_jhala => "Alap-Jhala",
});

tag_group!(CompositionTypeTags {
    dhrupad => "Dhrupad",
    bandish => "Bandish",
    thumri => "Thumri",
    ghazal => "Ghazal",
    qawwali => "Qawwali",
    dhun => "Dhun",
    tappa => "Tappa",
    bhajan => "Bhajan",
    kirtan => "Kirtan",
    kriti => "Kriti",
    masitkhani_gat => "Masitkhani Gat",
    razakhani_gat => "Razakhani Gat",
    ferozkhani_gat => "Ferozkhani Gat",
});

tag_group!(CompSectionTempoTags {
    ati_vilambit => "Ati Vilambit",
    vilambit => "Vilambit",
    madhya => "Madhya",
    drut => "Drut",
    ati_drut => "Ati Drut",
    jhala => "Jhala",
});

tag_group!(TalaTags {
    ektal => "Ektal",
    tintal => "Tintal",
    rupak => "Rupak",
});

tag_group!(ImprovisationTags { improvisation => "Improvisation" });

tag_group!(OtherTags { other => "Other" });

tag_group!(PhraseTypeTags {
    mohra => "Mohra",
    mukra => "Mukra",
    asthai => "Asthai",
    antara => "Antara",
    manjha => "Manjha",
    abhog => "Abhog",
    sanchari => "Sanchari",
    jhala => "Jhala",
});

tag_group!(ElaborationTags {
    vistar => "Vistar",
    barhat => "Barhat",
    prastar => "Prastar",
    bol_banao => "Bol Banao",
    bol_alap => "Bol Alap",
    bol_bandt => "Bol Bandt",
    behlava => "Behlava",
    gat_kari => "Gat-kari",
    tan_sapat => "Tan (Sapat)",
    tan_gamak => "Tan (Gamak)",
    laykari => "Laykari",
    tihai => "Tihai",
    chakradar => "Chakradar",
});

tag_group!(VocalArticulationTags {
    bol => "Bol",
    non_tom => "Non-Tom",
    tarana => "Tarana",
    aakar => "Aakar",
    sargam => "Sargam",
});

tag_group!(InstrumentalArticulationTags {
    bol => "Bol",
    non_bol => "Non-Bol",
});

tag_group!(IncidentalTags {
    talk => "Talk/Conversation",
    praise => "Praise ('Vah')",
    tuning => "Tuning",
    pause => "Pause",
});

/// Coarse label of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TopLevel {
    #[serde(rename = "Pre-Chiz Alap")]
    PreChizAlap,
    Alap,
    Composition,
    Improvisation,
    Other,
    #[default]
    None,
}

/// Tags of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionCategorization {
    #[serde(rename = "Pre-Chiz Alap", default)]
    pub pre_chiz_alap: PreChizAlapTags,
    #[serde(rename = "Alap", default)]
    pub alap: AlapTags,
    #[serde(rename = "Composition Type", default)]
    pub composition_type: CompositionTypeTags,
    #[serde(rename = "Comp.-section/Tempo", default)]
    pub comp_section_tempo: CompSectionTempoTags,
    #[serde(rename = "Tala", default)]
    pub tala: TalaTags,
    #[serde(rename = "Improvisation", default)]
    pub improvisation: ImprovisationTags,
    #[serde(rename = "Other", default)]
    pub other: OtherTags,
    #[serde(rename = "Top Level", default)]
    pub top_level: TopLevel,
}

impl SectionCategorization {
    /// Label implied by the tags, in fixed priority order
    pub fn derive_top_level(&self) -> TopLevel {
        if self.pre_chiz_alap.any() {
            TopLevel::PreChizAlap
        } else if self.alap.any() {
            TopLevel::Alap
        } else if self.composition_type.any() || self.comp_section_tempo.any() {
            TopLevel::Composition
        } else if self.improvisation.any() {
            TopLevel::Improvisation
        } else if self.other.any() {
            TopLevel::Other
        } else {
            TopLevel::None
        }
    }
}

/// Tags of one phrase on one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhraseCategorization {
    #[serde(rename = "Phrase", default)]
    pub phrase: PhraseTypeTags,
    #[serde(rename = "Elaboration", default)]
    pub elaboration: ElaborationTags,
    #[serde(rename = "Vocal Articulation", default)]
    pub vocal_articulation: VocalArticulationTags,
    #[serde(rename = "Instrumental Articulation", default)]
    pub instrumental_articulation: InstrumentalArticulationTags,
    #[serde(rename = "Incidental", default)]
    pub incidental: IncidentalTags,
}

const LEGACY_TEMPO_KEY: &str = "Composition-section/Tempo";
const TEMPO_KEY: &str = "Comp.-section/Tempo";
const TOP_LEVEL_KEY: &str = "Top Level";

/// Normalize a raw section record in place and return its typed form.
///
/// Moves the legacy tempo group to its current key, fills in missing
/// groups and tags, and derives "Top Level" when the record lacks one.
pub fn clean_up_section_categorization(raw: &mut Value) -> Result<SectionCategorization> {
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| ModelError::InvalidCategorization("section record is not an object".into()))?;

    if let Some(legacy) = obj.remove(LEGACY_TEMPO_KEY) {
        debug!("migrating '{}' to '{}'", LEGACY_TEMPO_KEY, TEMPO_KEY);
        obj.entry(TEMPO_KEY).or_insert(legacy);
    }
    let has_top_level = obj.contains_key(TOP_LEVEL_KEY);
    let source = Value::Object(obj.clone());

    let mut cat: SectionCategorization = serde_json::from_value(source.clone())
        .map_err(|e| ModelError::InvalidCategorization(e.to_string()))?;
    if !has_top_level {
        cat.top_level = cat.derive_top_level();
    }
    let typed = serde_json::to_value(cat)?;
    log_unknown_tags(&source, &typed);
    *raw = typed;
    Ok(cat)
}

/// Typed phrase tags from a raw record
pub fn phrase_categorization_from_value(raw: Value) -> Result<PhraseCategorization> {
    let cat: PhraseCategorization = serde_json::from_value(raw.clone())
        .map_err(|e| ModelError::InvalidCategorization(e.to_string()))?;
    log_unknown_tags(&raw, &serde_json::to_value(cat)?);
    Ok(cat)
}

/// Paths ("Group/Tag") present in `raw` but missing from its typed form
fn unknown_tags(raw: &Value, typed: &Value) -> Vec<String> {
    fn walk(raw: &Value, typed: &Value, path: &str, out: &mut Vec<String>) {
        let (Value::Object(raw), Value::Object(typed)) = (raw, typed) else {
            return;
        };
        for (key, value) in raw {
            let here = if path.is_empty() {
                key.clone()
            } else {
                format!("{}/{}", path, key)
            };
            match typed.get(key) {
                Some(t) => walk(value, t, &here, out),
                None => out.push(here),
            }
        }
    }
    let mut out = Vec::new();
    walk(raw, typed, "", &mut out);
    out
}

fn log_unknown_tags(raw: &Value, typed: &Value) {
    let dropped = unknown_tags(raw, typed);
    if !dropped.is_empty() {
        debug!(?dropped, "dropping tags outside the categorization schema");
    }
}

/// Serde adapter: phrase tag rows, logging unknown tags
pub(crate) fn deserialize_phrase_row<'de, D>(
    d: D,
) -> std::result::Result<Option<Vec<PhraseCategorization>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(d)?;
    raw.map(|row| {
        row.into_iter()
            .map(phrase_categorization_from_value)
            .collect::<Result<Vec<_>>>()
    })
    .transpose()
    .map_err(de::Error::custom)
}

/// Serde adapter: one track of section records, each cleaned up
pub(crate) fn deserialize_section_row<'de, D>(
    d: D,
) -> std::result::Result<Option<Vec<SectionCategorization>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(d)?;
    raw.map(clean_up_row).transpose().map_err(de::Error::custom)
}

/// Serde adapter: section records for every track, each cleaned up
pub(crate) fn deserialize_section_grid<'de, D>(
    d: D,
) -> std::result::Result<Option<Vec<Vec<SectionCategorization>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Vec<Value>>> = Option::deserialize(d)?;
    raw.map(|grid| grid.into_iter().map(clean_up_row).collect::<Result<Vec<_>>>())
        .transpose()
        .map_err(de::Error::custom)
}

fn clean_up_row(row: Vec<Value>) -> Result<Vec<SectionCategorization>> {
    row.into_iter()
        .map(|mut raw| clean_up_section_categorization(&mut raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bandish_is_composition() {
        let mut raw = json!({"Composition Type": {"Bandish": true}});
        let cat = clean_up_section_categorization(&mut raw).unwrap();
        assert_eq!(cat.top_level, TopLevel::Composition);
        assert_eq!(raw["Top Level"], "Composition");
        assert_eq!(raw["Improvisation"]["Improvisation"], false);
        assert_eq!(raw["Other"]["Other"], false);
    }

    #[test]
    fn test_legacy_tempo_key_migrated() {
        let mut raw = json!({"Composition-section/Tempo": {"Drut": true}});
        let cat = clean_up_section_categorization(&mut raw).unwrap();
        assert!(cat.comp_section_tempo.drut);
        assert!(raw.get("Composition-section/Tempo").is_none());
        assert_eq!(raw["Comp.-section/Tempo"]["Drut"], true);
        assert_eq!(cat.top_level, TopLevel::Composition);
    }

    #[test]
    fn test_priority_order() {
        let mut raw = json!({"Alap": {"Jor": true}, "Other": {"Other": true}});
        assert_eq!(clean_up_section_categorization(&mut raw).unwrap().top_level, TopLevel::Alap);

        let mut raw = json!({"Pre-Chiz Alap": {"Pre-Chiz Alap": true}, "Alap": {"Alap": true}});
        assert_eq!(
            clean_up_section_categorization(&mut raw).unwrap().top_level,
            TopLevel::PreChizAlap
        );

        let mut raw = json!({"Improvisation": {"Improvisation": true}, "Other": {"Other": true}});
        assert_eq!(
            clean_up_section_categorization(&mut raw).unwrap().top_level,
            TopLevel::Improvisation
        );

        let mut raw = json!({});
        assert_eq!(clean_up_section_categorization(&mut raw).unwrap().top_level, TopLevel::None);
    }

    #[test]
    fn test_existing_top_level_kept() {
        let mut raw = json!({"Alap": {"Alap": true}, "Top Level": "Other"});
        assert_eq!(clean_up_section_categorization(&mut raw).unwrap().top_level, TopLevel::Other);
    }

    #[test]
    fn test_not_an_object() {
        let mut raw = json!([1, 2]);
        assert!(matches!(
            clean_up_section_categorization(&mut raw),
            Err(ModelError::InvalidCategorization(_))
        ));
    }

    #[test]
    fn test_phrase_tag_backfill() {
        let cat: PhraseCategorization =
            serde_json::from_value(json!({"Elaboration": {"Vistar": true}})).unwrap();
        assert!(cat.elaboration.vistar);
        assert!(!cat.elaboration.bol_alap);
        let json = serde_json::to_value(cat).unwrap();
        assert_eq!(json["Elaboration"]["Bol Alap"], false);
        assert_eq!(json["Incidental"]["Praise ('Vah')"], false);
    }

    #[test]
    fn test_unknown_tags_reported() {
        let raw = json!({
            "Alap": {"Alap": true, "Nom-tom": true},
            "Raga Mood": {"Serene": true},
        });
        let typed = serde_json::to_value(SectionCategorization::default()).unwrap();
        assert_eq!(unknown_tags(&raw, &typed), vec!["Alap/Nom-tom", "Raga Mood"]);

        let known = serde_json::to_value(PhraseCategorization::default()).unwrap();
        assert!(unknown_tags(&known, &known).is_empty());
    }

    #[test]
    fn test_unknown_tags_do_not_block_loading() {
        let mut raw = json!({"Alap": {"Jor": true, "Nom-tom": true}, "Raga Mood": {}});
        let cat = clean_up_section_categorization(&mut raw).unwrap();
        assert!(cat.alap.jor);
        assert_eq!(cat.top_level, TopLevel::Alap);
        assert!(raw.get("Raga Mood").is_none());
        assert!(raw["Alap"].get("Nom-tom").is_none());

        let cat = phrase_categorization_from_value(json!({
            "Elaboration": {"Tihai": true, "Farmaish": true},
        }))
        .unwrap();
        assert!(cat.elaboration.tihai);
    }

    #[test]
    fn test_section_rows_deserialize_through_clean_up() {
        #[derive(Deserialize)]
        struct Rows {
            #[serde(default, deserialize_with = "deserialize_section_grid")]
            grid: Option<Vec<Vec<SectionCategorization>>>,
        }
        let rows: Rows =
            serde_json::from_value(json!({"grid": [[{"Composition Type": {"Bandish": true}}]]}))
                .unwrap();
        let grid = rows.grid.unwrap();
        assert_eq!(grid[0][0].top_level, TopLevel::Composition);

        let rows: Rows = serde_json::from_value(json!({})).unwrap();
        assert!(rows.grid.is_none());
        assert!(serde_json::from_value::<Rows>(json!({"grid": [[3]]})).is_err());
    }
}
