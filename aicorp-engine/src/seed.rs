//! Business context that parameterizes every prompt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessSector {
    Retail,
    Entertainment,
    OnlineServices,
    HardwareEngineering,
    Fashion,
    Fintech,
    Healthcare,
    Education,
    FoodBeverage,
    TravelHospitality,
    RealEstate,
    MediaPublishing,
    Gaming,
    Saas,
    Ecommerce,
    Sustainability,
    ArtificialIntelligence,
    Custom,
}

/// Catalog entry for [`available_sectors`].
#[derive(Debug, Clone, Serialize)]
pub struct SectorInfo {
    pub sector: BusinessSector,
    pub name: &'static str,
    pub description: &'static str,
    pub examples: [&'static str; 3],
}

const SECTORS: [SectorInfo; 18] = [
    SectorInfo { sector: BusinessSector::Retail, name: "Retail", description: "Physical and online retail businesses", examples: ["Department stores", "Specialty shops", "Pop-up stores"] },
    SectorInfo { sector: BusinessSector::Entertainment, name: "Entertainment", description: "Media, events, and entertainment services", examples: ["Streaming platforms", "Event venues", "Production studios"] },
    SectorInfo { sector: BusinessSector::OnlineServices, name: "Online Services", description: "Digital services and platforms", examples: ["Marketplaces", "Booking platforms", "Social networks"] },
    SectorInfo { sector: BusinessSector::HardwareEngineering, name: "Hardware Engineering", description: "Physical product design and manufacturing", examples: ["Consumer electronics", "IoT devices", "Industrial equipment"] },
    SectorInfo { sector: BusinessSector::Fashion, name: "Fashion", description: "Clothing, accessories, and fashion brands", examples: ["Apparel brands", "Accessories", "Sustainable fashion"] },
    SectorInfo { sector: BusinessSector::Fintech, name: "Fintech", description: "Financial technology and services", examples: ["Payment processing", "Digital banking", "Investment platforms"] },
    SectorInfo { sector: BusinessSector::Healthcare, name: "Healthcare", description: "Health and wellness products and services", examples: ["Telemedicine", "Health tracking", "Medical devices"] },
    SectorInfo { sector: BusinessSector::Education, name: "Education", description: "Learning and educational services", examples: ["Online courses", "EdTech platforms", "Tutoring services"] },
    SectorInfo { sector: BusinessSector::FoodBeverage, name: "Food & Beverage", description: "Food production, delivery, and services", examples: ["Meal delivery", "Restaurant concepts", "Food products"] },
    SectorInfo { sector: BusinessSector::TravelHospitality, name: "Travel & Hospitality", description: "Travel, tourism, and hospitality", examples: ["Booking platforms", "Hotels", "Experience tours"] },
    SectorInfo { sector: BusinessSector::RealEstate, name: "Real Estate", description: "Property and real estate services", examples: ["PropTech", "Property management", "Co-living spaces"] },
    SectorInfo { sector: BusinessSector::MediaPublishing, name: "Media & Publishing", description: "Content creation and publishing", examples: ["Digital magazines", "Content platforms", "Newsletters"] },
    SectorInfo { sector: BusinessSector::Gaming, name: "Gaming", description: "Video games and interactive entertainment", examples: ["Mobile games", "Console games", "VR/AR experiences"] },
    SectorInfo { sector: BusinessSector::Saas, name: "SaaS", description: "Software as a Service products", examples: ["Productivity tools", "Business software", "Developer tools"] },
    SectorInfo { sector: BusinessSector::Ecommerce, name: "E-commerce", description: "Online commerce and marketplaces", examples: ["DTC brands", "Marketplaces", "Subscription boxes"] },
    SectorInfo { sector: BusinessSector::Sustainability, name: "Sustainability", description: "Green and sustainable businesses", examples: ["Clean energy", "Recycling", "Sustainable products"] },
    SectorInfo { sector: BusinessSector::ArtificialIntelligence, name: "Artificial Intelligence", description: "AI-powered products and services", examples: ["AI assistants", "Automation tools", "ML platforms"] },
    SectorInfo { sector: BusinessSector::Custom, name: "Custom", description: "Define your own business sector", examples: ["Any industry", "Niche markets", "Experimental"] },
];

pub fn available_sectors() -> &'static [SectorInfo] {
    &SECTORS
}

impl BusinessSector {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessSector::Retail => "retail",
            BusinessSector::Entertainment => "entertainment",
            BusinessSector::OnlineServices => "online_services",
            BusinessSector::HardwareEngineering => "hardware_engineering",
            BusinessSector::Fashion => "fashion",
            BusinessSector::Fintech => "fintech",
            BusinessSector::Healthcare => "healthcare",
            BusinessSector::Education => "education",
            BusinessSector::FoodBeverage => "food_beverage",
            BusinessSector::TravelHospitality => "travel_hospitality",
            BusinessSector::RealEstate => "real_estate",
            BusinessSector::MediaPublishing => "media_publishing",
            BusinessSector::Gaming => "gaming",
            BusinessSector::Saas => "saas",
            BusinessSector::Ecommerce => "ecommerce",
            BusinessSector::Sustainability => "sustainability",
            BusinessSector::ArtificialIntelligence => "artificial_intelligence",
            BusinessSector::Custom => "custom",
        }
    }
}

impl fmt::Display for BusinessSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessSector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SECTORS
            .iter()
            .map(|info| info.sector)
            .find(|sector| sector.as_str() == wanted)
            .ok_or(ParseError {
                kind: "business sector",
                value: s.to_string(),
            })
    }
}

/// The company's business context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySeed {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub sector: BusinessSector,
    #[serde(default)]
    pub custom_sector: String,
    pub company_name: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub target_market: String,
    #[serde(default)]
    pub initial_budget: f64,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CompanySeed {
    pub fn new(company_name: impl Into<String>, sector: BusinessSector) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sector,
            custom_sector: String::new(),
            company_name: company_name.into(),
            mission: String::new(),
            vision: String::new(),
            target_market: String::new(),
            initial_budget: 0.0,
            constraints: Vec::new(),
            goals: Vec::new(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_target_market(mut self, market: impl Into<String>) -> Self {
        self.target_market = market.into();
        self
    }

    /// The custom name for `Custom` seeds, the sector's wire name otherwise.
    pub fn sector_name(&self) -> &str {
        if self.sector == BusinessSector::Custom && !self.custom_sector.is_empty() {
            &self.custom_sector
        } else {
            self.sector.as_str()
        }
    }

    /// Prompt preamble describing the company.
    pub fn context(&self) -> String {
        let mut ctx = format!(
            "COMPANY CONTEXT:\nCompany Name: {}\nBusiness Sector: {}\nTarget Market: {}\nMission: {}\nVision: {}",
            self.company_name,
            self.sector_name(),
            self.target_market,
            self.mission,
            self.vision
        );
        if self.initial_budget > 0.0 {
            ctx.push_str(&format!("\nInitial Budget: ${:.0}", self.initial_budget));
        }
        if !self.goals.is_empty() {
            ctx.push_str("\n\nCOMPANY GOALS:\n");
            for goal in &self.goals {
                ctx.push_str(&format!("- {goal}\n"));
            }
        }
        if !self.constraints.is_empty() {
            ctx.push_str("\nCONSTRAINTS:\n");
            for constraint in &self.constraints {
                ctx.push_str(&format!("- {constraint}\n"));
            }
        }
        ctx
    }

    pub fn mission_vision_prompt(&self) -> String {
        format!(
            "You are helping to bootstrap a new AI-powered company.\n\n\
             Business Sector: {}\nCompany Name: {}\nTarget Market: {}\n\n\
             Generate a compelling mission statement and vision statement for this company.\n\
             Keep each statement concise (1-2 sentences).\n\n\
             Respond in this exact format:\nMISSION: [mission statement]\nVISION: [vision statement]",
            self.sector_name(),
            self.company_name,
            self.target_market
        )
    }

    /// Fill empty mission/vision from a `MISSION:`/`VISION:` response, then
    /// from the sector fallbacks.
    pub fn apply_mission_vision(&mut self, response: Option<&str>) {
        if let Some(text) = response {
            for line in text.lines().map(str::trim) {
                if let Some(rest) = line.strip_prefix("MISSION:") {
                    if self.mission.is_empty() {
                        self.mission = rest.trim().to_string();
                    }
                } else if let Some(rest) = line.strip_prefix("VISION:") {
                    if self.vision.is_empty() {
                        self.vision = rest.trim().to_string();
                    }
                }
            }
        }
        if self.mission.is_empty() {
            self.mission = format!("To innovate and lead in the {} sector", self.sector_name());
        }
        if self.vision.is_empty() {
            self.vision = format!("Becoming the most trusted name in {}", self.sector_name());
        }
    }
}
