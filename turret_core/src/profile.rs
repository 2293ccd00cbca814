//! Trapezoidal velocity profile, re-planned every control tick.

/// Velocity setpoint (counts/s) for the next tick.
///
/// `current_velocity` is the setpoint issued on the previous tick. The
/// ramp-down starts once the remaining distance is within
/// `current_velocity² / acceleration`; the magnitude never exceeds
/// `max_speed`. At zero remaining distance the sign of `current_velocity` is
/// kept so an existing motion is ramped down rather than flipped.
///
/// Non-positive or non-finite `max_speed`/`acceleration` yield 0.
pub fn next_velocity(
    current_pos: i64,
    target_pos: i64,
    current_velocity: f32,
    max_speed: f32,
    acceleration: f32,
    dt_s: f32,
) -> f32 {
    if !(max_speed.is_finite() && max_speed > 0.0 && acceleration.is_finite() && acceleration > 0.0)
    {
        return 0.0;
    }
    let v = if current_velocity.is_finite() {
        current_velocity
    } else {
        0.0
    };
    let dt = if dt_s.is_finite() { dt_s.max(0.0) } else { 0.0 };

    let delta = target_pos.saturating_sub(current_pos);
    #[allow(clippy::cast_precision_loss)]
    let distance = delta.unsigned_abs() as f32;
    let direction = match delta.signum() {
        1 => 1.0,
        -1 => -1.0,
        _ if v < 0.0 => -1.0,
        _ => 1.0,
    };

    let speed = v.abs();
    let decel_distance = speed * speed / acceleration;
    let next = if distance <= decel_distance {
        (speed - acceleration * dt).max(0.0)
    } else if speed < max_speed {
        (speed + acceleration * dt).min(max_speed)
    } else {
        max_speed
    };
    direction * next.min(max_speed)
}
