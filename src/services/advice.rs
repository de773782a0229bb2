// src/services/advice.rs
//! Static advisory lookup: disease label -> remediation text

/// Returned for any label outside the known set; the request still succeeds
pub const FALLBACK_ADVICE: &str = "Unable to provide advice.";

/// Map a predicted label to its remediation advice
///
/// Total over all inputs: labels outside the closed classifier set fall back
/// to [`FALLBACK_ADVICE`] rather than failing the request.
pub fn advice_for(label: &str) -> &'static str {
    match label {
        "Tomato_Bacterial_spot" => {
            "Bacterial spot detected. Remove affected leaves and spray with copper-based bactericide."
        }
        "Tomato_Early_blight" => {
            "Early Blight detected. Remove infected leaves and apply copper-based fungicide."
        }
        "Tomato_Late_blight" => {
            "Late Blight detected. Use fungicide immediately and avoid overhead watering."
        }
        "Tomato_Leaf_Mold" => {
            "Leaf Mold detected. Improve ventilation and avoid moisture on leaves."
        }
        "Tomato_Septoria_leaf_spot" => {
            "Septoria Leaf Spot detected. Remove affected leaves and apply protective fungicide."
        }
        "Tomato_Spider_mites_Two_spotted_spider_mite" => {
            "Spider mites detected. Use insecticidal soap or neem oil to control."
        }
        "Tomato_Target_Spot" => {
            "Target Spot detected. Remove infected leaves and apply fungicide."
        }
        "Tomato_Tomato_YellowLeaf_Curl_Virus" => {
            "Yellow Leaf Curl Virus detected. Remove affected plants and control whiteflies."
        }
        "Tomato_Tomato_mosaic_virus" => {
            "Mosaic Virus detected. Remove affected plants and disinfect tools."
        }
        "Tomato_healthy" => "Your plant is healthy! No action is needed.",
        _ => FALLBACK_ADVICE,
    }
}
