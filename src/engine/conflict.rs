use ulid::Ulid;

use crate::limits::*;
use crate::model::{Ms, PropertyBookings, Stay};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_stay(stay: &Stay) -> Result<(), EngineError> {
    if stay.check_in >= stay.check_out || stay.nights() <= 0 {
        return Err(EngineError::InvalidRange);
    }
    if stay.check_in < MIN_VALID_TIMESTAMP_MS || stay.check_out > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub(crate) fn validate_guests(guests: u32) -> Result<(), EngineError> {
    if !(MIN_GUESTS..=MAX_GUESTS).contains(&guests) {
        return Err(EngineError::LimitExceeded("guest count out of range"));
    }
    Ok(())
}

/// First live booking on this property whose stay strictly overlaps `stay`.
/// Update flows pass `exclude` so a booking never conflicts with itself.
pub(crate) fn find_conflict(
    property: &PropertyBookings,
    stay: &Stay,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    property
        .overlapping(stay)
        .find(|b| exclude != Some(b.id))
        .map(|b| b.id)
}

pub(crate) fn check_no_conflict(
    property: &PropertyBookings,
    stay: &Stay,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(property, stay, exclude) {
        Some(id) => Err(EngineError::RangeConflict(id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Booking, NIGHT_MS};

    fn stay(from: i64, to: i64) -> Stay {
        Stay::new(from * NIGHT_MS, to * NIGHT_MS)
    }

    fn property_with(stays: &[(i64, i64)]) -> (PropertyBookings, Vec<Ulid>) {
        let mut pb = PropertyBookings::new(Ulid::new());
        let mut ids = Vec::new();
        for &(from, to) in stays {
            let b = Booking {
                id: Ulid::new(),
                property_id: pb.property_id,
                stay: stay(from, to),
                guests: 2,
                total_price: 0.0,
            };
            ids.push(b.id);
            pb.insert(b);
        }
        (pb, ids)
    }

    #[test]
    fn overlapping_candidate_conflicts() {
        let (pb, ids) = property_with(&[(5, 10)]);
        assert_eq!(find_conflict(&pb, &stay(8, 12), None), Some(ids[0]));
    }

    #[test]
    fn adjacent_candidate_does_not_conflict() {
        let (pb, _) = property_with(&[(5, 10)]);
        assert_eq!(find_conflict(&pb, &stay(10, 15), None), None);
        assert_eq!(find_conflict(&pb, &stay(1, 5), None), None);
    }

    #[test]
    fn excluded_booking_ignored() {
        let (pb, ids) = property_with(&[(5, 10)]);
        // The booking's own unchanged range never self-conflicts.
        assert_eq!(find_conflict(&pb, &stay(5, 10), Some(ids[0])), None);
    }

    #[test]
    fn exclusion_still_sees_other_bookings() {
        let (pb, ids) = property_with(&[(5, 10), (12, 15)]);
        assert_eq!(find_conflict(&pb, &stay(9, 13), Some(ids[0])), Some(ids[1]));
    }

    #[test]
    fn validate_stay_rejects_inverted_and_empty() {
        assert!(matches!(
            validate_stay(&Stay { check_in: 10, check_out: 10 }),
            Err(EngineError::InvalidRange)
        ));
        assert!(matches!(
            validate_stay(&Stay { check_in: 20, check_out: 10 }),
            Err(EngineError::InvalidRange)
        ));
        // Positive but shorter than one night
        assert!(matches!(
            validate_stay(&Stay { check_in: 0, check_out: NIGHT_MS / 2 }),
            Err(EngineError::InvalidRange)
        ));
    }

    #[test]
    fn validate_stay_rejects_marathon_stays() {
        let result = validate_stay(&stay(0, MAX_STAY_NIGHTS + 1));
        assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
        validate_stay(&stay(0, MAX_STAY_NIGHTS)).unwrap();
    }

    #[test]
    fn validate_guests_bounds() {
        assert!(validate_guests(0).is_err());
        validate_guests(MIN_GUESTS).unwrap();
        validate_guests(MAX_GUESTS).unwrap();
        assert!(validate_guests(MAX_GUESTS + 1).is_err());
    }
}
