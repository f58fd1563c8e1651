//! Static benefits descriptions keyed by species label.

use crate::classifier::Label;
use std::collections::HashMap;

/// Shown for labels the table has no entry for.
pub const BENEFITS_UNAVAILABLE: &str = "Benefits information not available.";

const BUILTIN_BENEFITS: &[(&str, &str)] = &[
    ("Alpinia Galanga (Rasna)", "Used for pain relief and digestive issues."),
    ("Amaranthus Viridis (Arive-Dantu)", "Good for anemia and inflammation."),
    ("Artocarpus Heterophyllus (Jackfruit)", "Rich in nutrients, aids digestion."),
    ("Azadirachta Indica (Neem)", "Purifies blood, treats skin disorders."),
    ("Basella Alba (Basale)", "Rich in iron and vitamins."),
    ("Brassica Juncea (Indian Mustard)", "Used for joint pain and respiratory issues."),
    ("Carissa Carandas (Karanda)", "Boosts digestion and treats anemia."),
    ("Citrus Limon (Lemon)", "Rich in Vitamin C, aids immunity."),
    ("Ficus Auriculata (Roxburgh fig)", "Used for diabetes management."),
    ("Ficus Religiosa (Peepal Tree)", "Used for asthma and diabetes."),
    ("Hibiscus Rosa-sinensis", "Good for hair health and digestive issues."),
    ("Jasminum (Jasmine)", "Used for stress relief and skin care."),
    ("Mangifera Indica (Mango)", "Rich in antioxidants, boosts immunity."),
    ("Mentha (Mint)", "Aids digestion and relieves headaches."),
    ("Moringa Oleifera (Drumstick)", "Rich in vitamins, anti-inflammatory."),
    ("Muntingia Calabura (Jamaica Cherry-Gasagase)", "Used for pain relief."),
    ("Murraya Koenigii (Curry)", "Good for hair and digestion."),
    ("Nerium Oleander (Oleander)", "Used externally for skin issues."),
    ("Nyctanthes Arbor-tristis (Parijata)", "Used for fever and joint pain."),
    ("Ocimum Tenuiflorum (Tulsi)", "Boosts immunity, good for respiratory health."),
    ("Piper Betle (Betel)", "Used for digestive health."),
    ("Plectranthus Amboinicus (Mexican Mint)", "Good for cough and cold."),
    ("Pongamia Pinnata (Indian Beech)", "Used for skin diseases and wounds."),
    ("Psidium Guajava (Guava)", "Rich in Vitamin C, boosts immunity."),
    ("Punica Granatum (Pomegranate)", "Rich in antioxidants, good for blood health."),
    ("Santalum Album (Sandalwood)", "Used for skin care and cooling."),
    ("Syzygium Cumini (Jamun)", "Used for diabetes management."),
    ("Syzygium Jambos (Rose Apple)", "Good for digestive health."),
    ("Tabernaemontana Divaricata (Crape Jasmine)", "Used for pain relief."),
    ("Trigonella Foenum-graecum (Fenugreek)", "Good for diabetes and digestion."),
];

/// Immutable label → benefits mapping.
#[derive(Debug, Clone)]
pub struct BenefitsTable {
    entries: HashMap<&'static str, &'static str>,
}

impl BenefitsTable {
    /// The table shipped with the service.
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_BENEFITS)
    }

    pub fn from_entries(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
        }
    }

    pub fn get(&self, label: &Label) -> Option<&'static str> {
        self.entries.get(label.as_str()).copied()
    }

    /// Benefits for `label`, or [`BENEFITS_UNAVAILABLE`]. Never fails.
    pub fn get_or_default(&self, label: &Label) -> &'static str {
        self.get(label).unwrap_or(BENEFITS_UNAVAILABLE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels from `labels` with no entry in this table.
    pub fn missing<'a>(&self, labels: impl Iterator<Item = &'a Label>) -> Vec<&'a Label> {
        labels.filter(|l| self.get(l).is_none()).collect()
    }
}

impl Default for BenefitsTable {
    fn default() -> Self {
        Self::builtin()
    }
}
