//! Entitlement lifecycle rules shared by the entitlement resources.
//!
//! FortiFlex entitlements move between `PENDING`, `ACTIVE`, `STOPPED` and
//! `EXPIRED`. Users may only ask for `ACTIVE` or `STOPPED`; the service
//! decides the other two.

use crate::error::ProviderError;
use crate::schema::Diagnostic;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntitlementStatus {
    Pending,
    Active,
    Stopped,
    Expired,
}

impl EntitlementStatus {
    /// The wire spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Stopped => "STOPPED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse a wire status. Unknown spellings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "ACTIVE" => Some(Self::Active),
            "STOPPED" => Some(Self::Stopped),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Stop,
    Reactivate,
}

impl StatusAction {
    /// The endpoint suffix under `entitlements/`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Reactivate => "reactivate",
        }
    }
}

/// Outcome of [`plan_transition`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transition {
    /// The call to make, if any.
    pub action: Option<StatusAction>,
    /// A warning to surface next to the result.
    pub warning: Option<Diagnostic>,
}

/// Decide what to call to move an entitlement from `current` to `desired`.
///
/// `desired` is `None` when the user left `status` unset.
pub fn plan_transition(
    current: Option<EntitlementStatus>,
    desired: Option<EntitlementStatus>,
) -> Result<Transition, ProviderError> {
    let Some(desired) = desired else {
        return Ok(Transition::default());
    };
    if Some(desired) == current {
        return Ok(Transition::default());
    }

    match desired {
        EntitlementStatus::Active => {
            let warning = (current == Some(EntitlementStatus::Pending)).then(|| {
                Diagnostic::warning("Unable to change status from PENDING to ACTIVE").with_detail(
                    "The current entitlement status is PENDING. You can't manually change PENDING to ACTIVE. \
                     Once you use the token, the entitlement becomes ACTIVE.",
                )
            });
            Ok(Transition {
                action: Some(StatusAction::Reactivate),
                warning,
            })
        },
        EntitlementStatus::Stopped => Ok(Transition {
            action: Some(StatusAction::Stop),
            warning: None,
        }),
        other => Err(ProviderError::Validation(format!(
            "status {} is managed by FortiFlex and can not be set; use ACTIVE or STOPPED",
            other
        ))),
    }
}

/// Resource identifier of an entitlement: `serial_number.config_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementId {
    pub serial_number: String,
    pub config_id: i64,
}

impl EntitlementId {
    pub fn new(serial_number: impl Into<String>, config_id: i64) -> Self {
        Self {
            serial_number: serial_number.into(),
            config_id,
        }
    }
}

impl FromStr for EntitlementId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [serial_number, config_id] = parts.as_slice() else {
            return Err(ProviderError::InvalidRequest(format!(
                "Unable to handle entitlement id {:?}. Incorrect id format. Please use \
                 'serial_number' + '.' + 'config_id', example: 'FGVMMLTM12345678.123'",
                s
            )));
        };
        let config_id = config_id.parse::<i64>().map_err(|_| {
            ProviderError::InvalidRequest(format!(
                "The entitlement id is incorrect. Please use 'serial_number' + '.' + 'config_id', \
                 example: 'FGVMMLTM12345678.123'. Your serial_number: {}, your config_id: {} \
                 (should be an integer).",
                serial_number, config_id
            ))
        })?;
        Ok(Self::new(*serial_number, config_id))
    }
}

impl fmt::Display for EntitlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.serial_number, self.config_id)
    }
}

/// Which entitlement resource is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementKind {
    Vm,
    Hardware,
    Cloud,
}

impl EntitlementKind {
    /// How a requested `end_date` is vetted for this kind.
    pub fn end_date_policy(self) -> EndDatePolicy {
        match self {
            Self::Vm => EndDatePolicy::AfterToday,
            Self::Hardware | Self::Cloud => EndDatePolicy::AfterCurrent,
        }
    }
}

/// Whether deleting the resource must stop the entitlement first.
///
/// Hardware entitlements look at the recorded status; VM and cloud ones look
/// at the status just read back.
pub fn requires_stop_on_delete(kind: EntitlementKind, status: Option<EntitlementStatus>) -> bool {
    match kind {
        EntitlementKind::Hardware => status == Some(EntitlementStatus::Active),
        EntitlementKind::Vm | EntitlementKind::Cloud => status != Some(EntitlementStatus::Stopped),
    }
}

/// Rule for accepting a user supplied `end_date` on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDatePolicy {
    /// Accept any ISO-8601 date after today's midnight (UTC).
    AfterToday,
    /// Accept an RFC 3339 date later than the entitlement's current end date.
    AfterCurrent,
}

/// What to do with a requested end date.
#[derive(Debug, Clone, PartialEq)]
pub enum EndDateDecision {
    /// Send the value as `endDate`.
    Send(String),
    /// Leave `endDate` out of the request, optionally warning about it.
    Skip(Option<Diagnostic>),
    /// Do not send the update at all.
    Abort(Diagnostic),
}

impl EndDatePolicy {
    /// Vet `requested` against `current` (the entitlement's end date) at `now`.
    pub fn decide(self, requested: &str, current: Option<&str>, now: DateTime<Utc>) -> EndDateDecision {
        match self {
            Self::AfterToday => {
                let midnight = now.date_naive().and_time(NaiveTime::default()).and_utc();
                let Some(user) = parse_iso8601(requested) else {
                    return EndDateDecision::Skip(Some(unparseable(requested)));
                };
                if user > midnight {
                    EndDateDecision::Send(requested.to_string())
                } else {
                    EndDateDecision::Skip(Some(
                        Diagnostic::warning("end_date can not be before today's date, ignoring update end_date")
                            .with_detail(format!("today's date: {}, end_date: {}.", midnight, user)),
                    ))
                }
            },
            Self::AfterCurrent => {
                let Ok(user) = DateTime::parse_from_rfc3339(requested) else {
                    return EndDateDecision::Abort(unparseable(requested));
                };
                match current.and_then(|c| DateTime::parse_from_rfc3339(c).ok()) {
                    Some(current) if current < user => EndDateDecision::Send(requested.to_string()),
                    _ => EndDateDecision::Skip(None),
                }
            },
        }
    }
}

fn unparseable(requested: &str) -> Diagnostic {
    Diagnostic::warning("Unable to parse end_date, ignoring update end_date")
        .with_detail(format!("Unable to parse {}, please check the format.", requested))
        .with_attribute("end_date")
}

/// Parse the ISO-8601 layouts FortiFlex users commonly write. Values without
/// an offset are taken as UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(parsed.and_utc());
        }
    }
    // chrono needs minutes to build a time, so an hour-only value gets them added.
    if let Ok(parsed) = NaiveDateTime::parse_from_str(&format!("{}:00", value), "%Y-%m-%dT%H:%M") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
