//! Prediction data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Closed set of classes the model can emit, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiseaseLabel {
    BacterialSpot,
    EarlyBlight,
    LateBlight,
    LeafMold,
    SeptoriaLeafSpot,
    SpiderMites,
    TargetSpot,
    YellowLeafCurlVirus,
    MosaicVirus,
    Healthy,
}

impl DiseaseLabel {
    /// All labels, indexed by model output position
    pub const ALL: [DiseaseLabel; 10] = [
        DiseaseLabel::BacterialSpot,
        DiseaseLabel::EarlyBlight,
        DiseaseLabel::LateBlight,
        DiseaseLabel::LeafMold,
        DiseaseLabel::SeptoriaLeafSpot,
        DiseaseLabel::SpiderMites,
        DiseaseLabel::TargetSpot,
        DiseaseLabel::YellowLeafCurlVirus,
        DiseaseLabel::MosaicVirus,
        DiseaseLabel::Healthy,
    ];

    /// Map a model output index to its label
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The label string as emitted by the pretrained model's class list
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseLabel::BacterialSpot => "Tomato_Bacterial_spot",
            DiseaseLabel::EarlyBlight => "Tomato_Early_blight",
            DiseaseLabel::LateBlight => "Tomato_Late_blight",
            DiseaseLabel::LeafMold => "Tomato_Leaf_Mold",
            DiseaseLabel::SeptoriaLeafSpot => "Tomato_Septoria_leaf_spot",
            DiseaseLabel::SpiderMites => "Tomato_Spider_mites_Two_spotted_spider_mite",
            DiseaseLabel::TargetSpot => "Tomato_Target_Spot",
            DiseaseLabel::YellowLeafCurlVirus => "Tomato_Tomato_YellowLeaf_Curl_Virus",
            DiseaseLabel::MosaicVirus => "Tomato_Tomato_mosaic_virus",
            DiseaseLabel::Healthy => "Tomato_healthy",
        }
    }
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History ledger row: one per successful prediction, never mutated
#[derive(FromRow, Serialize, Deserialize, Debug)]
pub struct PredictionRecord {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub prediction: String,
    pub advice: String,
    pub audio_path: String,
    pub created_at: Option<String>,
}

/// Response body for POST /predict
#[derive(Serialize, Deserialize, Debug)]
pub struct PredictResponse {
    pub filename: String,
    pub prediction: String,
    pub advice: String,
    pub audio_file: String,
}

/// Query string for GET /history/:user_id
#[derive(Deserialize, Debug)]
pub struct HistoryQuery {
    pub token: String,
}

/// Response body for GET /history/:user_id
///
/// Rows serialize as `[filename, prediction, advice, audio_path, timestamp]`.
#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub history: Vec<(String, String, String, String, String)>,
}
