//! Validated settings structures

use crate::schema::{RawConfig, RawInstructor, RawLiveConfig, RawServiceConfig, RawSlotGroup};
use crate::validation::{parse_date, parse_days, parse_price};
use mentora_api::{
    parse_session_count, ApprovalStatus, AvailabilitySlot, Instructor, JoinWindow, Package,
    RateTable, Service,
};
use mentora_util::{default_data_dir, InstructorId, PackageId, ServiceId, WallClock};
use std::path::PathBuf;
use std::time::Duration;

/// Validated settings ready for use by the engine
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub join_window: JoinWindow,
    pub live: LiveRoomSettings,
    pub catalog: Catalog,
    /// Instructors to insert when absent from the store
    pub instructors: Vec<Instructor>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let defaults = JoinWindow::default();
        let join_window = JoinWindow {
            join_minutes_before: raw
                .join_window
                .join_minutes_before
                .unwrap_or(defaults.join_minutes_before),
            expire_minutes_after: raw
                .join_window
                .expire_minutes_after
                .unwrap_or(defaults.expire_minutes_after),
        };

        let catalog = Catalog {
            packages: raw
                .packages
                .into_iter()
                .filter_map(|p| {
                    Some(Package {
                        id: PackageId::new(p.id),
                        name: p.name,
                        price: parse_price(&p.price).ok()?,
                        session_count: parse_session_count(&p.sessions)?,
                        sessions_descriptor: p.sessions,
                    })
                })
                .collect(),
            services: raw
                .services
                .into_iter()
                .filter_map(|s| {
                    Some(Service {
                        id: ServiceId::new(s.id),
                        name: s.name,
                        price: parse_price(&s.price).ok()?,
                    })
                })
                .collect(),
        };

        Self {
            service: ServiceConfig::from_raw(raw.service),
            join_window,
            live: LiveRoomSettings::from_raw(raw.live),
            catalog,
            instructors: raw.instructors.into_iter().map(convert_instructor).collect(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub sweep_interval: Duration,
    pub scheduling_horizon_days: u32,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            sweep_interval: raw
                .sweep_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            scheduling_horizon_days: raw
                .scheduling_horizon_days
                .unwrap_or(defaults.scheduling_horizon_days),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sweep_interval: Duration::from_secs(60),
            scheduling_horizon_days: 56,
        }
    }
}

/// What the gate hands to the live transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRoomSettings {
    pub room_prefix: String,
    pub domain: String,
    pub start_audio_muted: bool,
    pub start_video_muted: bool,
    pub permission_timeout: Duration,
}

impl LiveRoomSettings {
    fn from_raw(raw: RawLiveConfig) -> Self {
        let defaults = Self::default();
        Self {
            room_prefix: raw.room_prefix.unwrap_or(defaults.room_prefix),
            domain: raw.domain.unwrap_or(defaults.domain),
            start_audio_muted: raw.start_audio_muted.unwrap_or(defaults.start_audio_muted),
            start_video_muted: raw.start_video_muted.unwrap_or(defaults.start_video_muted),
            permission_timeout: raw
                .permission_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.permission_timeout),
        }
    }
}

impl Default for LiveRoomSettings {
    fn default() -> Self {
        Self {
            room_prefix: "mentora-session-".into(),
            domain: "meet.jit.si".into(),
            start_audio_muted: true,
            start_video_muted: false,
            permission_timeout: Duration::from_secs(15),
        }
    }
}

/// Package and service catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub packages: Vec<Package>,
    pub services: Vec<Service>,
}

impl Catalog {
    pub fn get_package(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| &p.id == id)
    }

    pub fn get_service(&self, id: &ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| &s.id == id)
    }
}

// Conversion helpers

fn convert_instructor(raw: RawInstructor) -> Instructor {
    let mut instructor = Instructor::new(InstructorId::new(raw.id), raw.name);
    instructor.bio = raw.bio;
    instructor.rates = RateTable {
        packages: raw
            .package_rates
            .iter()
            .filter_map(|(id, rate)| Some((PackageId::new(id.as_str()), parse_price(rate).ok()?)))
            .collect(),
        services: raw
            .service_rates
            .iter()
            .filter_map(|(id, rate)| Some((ServiceId::new(id.as_str()), parse_price(rate).ok()?)))
            .collect(),
    };
    instructor.availability = raw.availability.iter().flat_map(convert_slot_group).collect();
    if !instructor.availability.is_empty() {
        instructor.schedule_status = ApprovalStatus::Approved;
    }
    instructor
}

fn convert_slot_group(group: &RawSlotGroup) -> Vec<AvailabilitySlot> {
    let times: Vec<WallClock> = group
        .times
        .iter()
        .filter_map(|t| WallClock::parse(t).ok())
        .collect();

    if let Some(date) = group.date.as_deref().and_then(|d| parse_date(d).ok()) {
        return times
            .into_iter()
            .map(|time| AvailabilitySlot::on_date(date, time))
            .collect();
    }

    let days = group
        .days
        .as_ref()
        .and_then(|d| parse_days(d).ok())
        .unwrap_or_default();

    days.iter()
        .flat_map(|day| times.iter().map(|time| AvailabilitySlot::weekly(*day, *time)))
        .collect()
}
