//! Carrying rays into and out of instance space.

use rayweave_math::{interpolate_motion, Transform};

use crate::features::Features;
use crate::node_test::SlabRay;
use crate::scene::ObjectRecord;

/// World-to-object transform of `object` at shutter `time`.
///
/// Motion keys are only honoured when the feature set includes motion.
/// If the interpolated transform cannot be inverted the static inverse is used.
pub fn object_inverse<F: Features>(object: &ObjectRecord, time: f32) -> Transform {
    if F::MOTION && !object.motion.is_empty() {
        if let Some(inverse) = interpolate_motion(&object.motion, time).and_then(|t| t.inverse()) {
            return inverse;
        }
    }
    object.inverse
}

/// Transform a traversal ray into the space of `object`.
///
/// The direction is not renormalized, so the interval and every hit
/// distance keep their meaning on both sides of the transform.
pub fn enter_object<F: Features>(object: &ObjectRecord, ray: &SlabRay, time: f32) -> SlabRay {
    if !object.is_instanced() {
        return *ray;
    }
    let inverse = object_inverse::<F>(object, time);
    SlabRay::new(
        inverse.apply_point(&ray.origin),
        inverse.apply_vec(&ray.dir),
        ray.tmin,
        ray.tmax,
    )
}

/// Restore the enclosing ray when leaving an instance, keeping the interval
/// end reached inside it.
#[inline]
pub fn exit_object(saved: &SlabRay, current_tmax: f32) -> SlabRay {
    SlabRay {
        tmax: current_tmax,
        ..*saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Instanced, InstancedMotion};
    use crate::node::NodeRef;
    use approx::assert_relative_eq;
    use rayweave_math::{DecomposedTransform, Point3, Vec3};

    #[test]
    fn test_enter_scaled_instance_keeps_t() {
        let object = ObjectRecord::instanced(NodeRef::Internal(0), Transform::scale(2.0, 2.0, 2.0));
        let world = SlabRay::new(Point3::new(0.0, 0.0, 10.0), -Vec3::z(), 0.0, 100.0);
        let local = enter_object::<Instanced>(&object, &world, 0.0);
        assert_relative_eq!(local.origin.z, 5.0);
        assert_relative_eq!(local.dir.z, -0.5);
        // A surface at world z = 4 sits at local z = 2; both give t = 6.
        let t_world = (4.0 - world.origin.z) / world.dir.z;
        let t_local = (2.0 - local.origin.z) / local.dir.z;
        assert_relative_eq!(t_world, t_local);
        assert_eq!(local.tmax, 100.0);
    }

    #[test]
    fn test_flattened_object_passes_through() {
        let object = ObjectRecord::flattened();
        let ray = SlabRay::new(Point3::new(1.0, 2.0, 3.0), Vec3::x(), 0.5, 9.0);
        let same = enter_object::<Instanced>(&object, &ray, 0.0);
        assert_eq!(same.origin, ray.origin);
        assert_eq!(same.tmin, 0.5);
    }

    #[test]
    fn test_motion_keys_need_feature() {
        let keys = vec![
            DecomposedTransform::from_transform(&Transform::identity()),
            DecomposedTransform::from_transform(&Transform::translation(4.0, 0.0, 0.0)),
        ];
        let object = ObjectRecord::instanced(NodeRef::Internal(0), Transform::identity()).with_motion(keys);
        let ray = SlabRay::new(Point3::origin(), Vec3::z(), 0.0, 1.0);
        let moving = enter_object::<InstancedMotion>(&object, &ray, 0.5);
        assert_relative_eq!(moving.origin.x, -2.0, epsilon = 1e-5);
        let fixed = enter_object::<Instanced>(&object, &ray, 0.5);
        assert_relative_eq!(fixed.origin.x, 0.0);
    }

    #[test]
    fn test_exit_keeps_shrunk_tmax() {
        let saved = SlabRay::new(Point3::origin(), Vec3::x(), 0.0, 50.0);
        let restored = exit_object(&saved, 7.5);
        assert_eq!(restored.tmax, 7.5);
        assert_eq!(restored.near_far, saved.near_far);
    }
}
