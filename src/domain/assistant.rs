//! Massage assistant
//!
//! Rule-based session recommendations, quick presets, and the countdown
//! timer shown while an assistant session runs.

use crate::domain::models::DeviceCommand;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const MIN_DURATION_MINUTES: u16 = 10;
pub const MAX_DURATION_MINUTES: u16 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    BackPain,
    NeckPain,
    Stress,
    Fatigue,
    Insomnia,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::BackPain,
        Condition::NeckPain,
        Condition::Stress,
        Condition::Fatigue,
        Condition::Insomnia,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Condition::BackPain => "Back pain",
            Condition::NeckPain => "Neck pain",
            Condition::Stress => "Stress",
            Condition::Fatigue => "Fatigue",
            Condition::Insomnia => "Insomnia",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Goal {
    #[default]
    Relaxation,
    PainRelief,
    Recovery,
    Energy,
}

impl Goal {
    pub const ALL: [Goal; 4] = [Goal::Relaxation, Goal::PainRelief, Goal::Recovery, Goal::Energy];

    pub fn label(&self) -> &'static str {
        match self {
            Goal::Relaxation => "Relaxation",
            Goal::PainRelief => "Pain relief",
            Goal::Recovery => "Recovery",
            Goal::Energy => "Energy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub weight_kg: f32,
    pub height_cm: f32,
    pub conditions: Vec<Condition>,
    pub goal: Goal,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: 30,
            weight_kg: 70.0,
            height_cm: 175.0,
            conditions: Vec::new(),
            goal: Goal::default(),
        }
    }
}

impl UserProfile {
    pub fn toggle(&mut self, condition: Condition) {
        if let Some(pos) = self.conditions.iter().position(|c| *c == condition) {
            self.conditions.remove(pos);
        } else {
            self.conditions.push(condition);
        }
    }

    /// Body mass index, `None` for a non-positive height
    pub fn bmi(&self) -> Option<f32> {
        if self.height_cm <= 0.0 {
            return None;
        }
        let height_m = self.height_cm / 100.0;
        Some(self.weight_kg / (height_m * height_m))
    }

    fn has(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }
}

/// A session plan the device can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub mode: String,
    pub level: u8,
    pub duration_minutes: u16,
    pub heat: bool,
    pub explanation: String,
}

impl Recommendation {
    /// Command that starts this plan on the device
    pub fn to_command(&self) -> DeviceCommand {
        DeviceCommand::AssistantConfig {
            level: self.level as i32,
            heat_on: self.heat,
            duration_minutes: self.duration_minutes as u32,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_minutes as u64 * 60)
    }
}

/// Build a recommendation from a user profile
pub fn recommend(profile: &UserProfile) -> Recommendation {
    let mut level: u8;
    let mut duration: u16;
    let mut heat = false;
    let mut mode = "Balanced Massage";
    let mut explanation = String::new();

    match profile.age {
        0..=24 => {
            level = 4;
            duration = 15;
            explanation.push_str("Young age: higher intensity recommended. ");
        }
        25..=39 => {
            level = 3;
            duration = 15;
            explanation.push_str("Prime age: moderate intensity for balance. ");
        }
        40..=59 => {
            level = 2;
            duration = 20;
            heat = true;
            explanation.push_str("Middle age: gentle with heat therapy. ");
        }
        _ => {
            level = 1;
            duration = 15;
            heat = true;
            explanation.push_str("Senior: very gentle massage recommended. ");
        }
    }

    if profile.bmi().is_some_and(|bmi| bmi > 25.0) {
        duration += 5;
        explanation.push_str("Higher BMI: longer duration beneficial. ");
    }

    if profile.has(Condition::BackPain) || profile.has(Condition::NeckPain) {
        heat = true;
        level = level.min(3);
        mode = "Pain Relief Mode";
        explanation.push_str("Pain conditions: heat therapy + moderate intensity. ");
    }

    if profile.has(Condition::Stress) || profile.has(Condition::Insomnia) {
        level = level.min(2);
        duration = duration.max(20);
        heat = true;
        mode = "Relaxation Mode";
        explanation.push_str("Stress/insomnia: gentle, long session with heat. ");
    }

    if profile.has(Condition::Fatigue) {
        level = level.max(3);
        explanation.push_str("Fatigue: moderate intensity to boost circulation. ");
    }

    match profile.goal {
        Goal::PainRelief => {
            heat = true;
            level = level.min(3);
            mode = "Therapeutic Mode";
        }
        Goal::Recovery => {
            level = level.max(3);
            duration = 20;
            mode = "Recovery Mode";
            explanation.push_str("Recovery goal: longer, intense session. ");
        }
        Goal::Energy => {
            level = level.max(4);
            duration = 10;
            heat = false;
            mode = "Energy Boost Mode";
            explanation.push_str("Energy boost: short, intense session. ");
        }
        Goal::Relaxation => {}
    }

    Recommendation {
        mode: mode.to_string(),
        level: level.clamp(MIN_LEVEL, MAX_LEVEL),
        duration_minutes: duration.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES),
        heat,
        explanation,
    }
}

/// One-tap session plans
pub fn presets() -> Vec<Recommendation> {
    vec![
        Recommendation {
            mode: "Morning Energy".to_string(),
            level: 4,
            duration_minutes: 10,
            heat: false,
            explanation: "Quick energizing massage to start your day".to_string(),
        },
        Recommendation {
            mode: "Evening Relaxation".to_string(),
            level: 2,
            duration_minutes: 20,
            heat: true,
            explanation: "Gentle massage with heat for deep relaxation".to_string(),
        },
        Recommendation {
            mode: "Deep Tissue".to_string(),
            level: 5,
            duration_minutes: 15,
            heat: true,
            explanation: "Intense massage for muscle recovery".to_string(),
        },
    ]
}

/// Countdown for a running assistant session
#[derive(Debug, Clone, Copy)]
pub struct SessionTimer {
    started_at: Instant,
    duration: Duration,
}

impl SessionTimer {
    pub fn start(duration: Duration) -> Self {
        Self::started_at(Instant::now(), duration)
    }

    pub fn started_at(started_at: Instant, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
        }
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }

    pub fn is_finished_at(&self, now: Instant) -> bool {
        self.remaining_at(now).is_zero()
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished_at(Instant::now())
    }

    /// `Timer: MM:SS`
    pub fn label_at(&self, now: Instant) -> String {
        let secs = self.remaining_at(now).as_secs();
        format!("Timer: {:02}:{:02}", secs / 60, secs % 60)
    }
}
