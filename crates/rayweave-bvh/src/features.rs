//! Compile-time feature sets for traversal specialisation.
//!
//! Each capability type fixes which scene features the traversal loop
//! handles, so code for absent features is removed at monomorphisation.
//! A kernel picks the smallest type that covers its scene.

use bitflags::bitflags;

bitflags! {
    /// Scene features that require traversal support.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FeatureSet: u32 {
        /// Instance leaves.
        const INSTANCING = 1 << 0;
        /// Motion triangles or objects with motion keys.
        const MOTION = 1 << 1;
        /// Curve segments.
        const HAIR = 1 << 2;
        /// Point primitives.
        const POINTCLOUD = 1 << 3;
    }
}

/// Capabilities compiled into one traversal variant.
pub trait Features: Copy + Send + Sync + 'static {
    /// Enter instance leaves.
    const INSTANCING: bool;
    /// Interpolate motion triangles and object motion keys.
    const MOTION: bool;
    /// Intersect curve segments.
    const HAIR: bool;
    /// Intersect points.
    const POINTCLOUD: bool;
    /// Name logged when a kernel selects this variant.
    const NAME: &'static str;

    /// The feature set this variant supports.
    fn supported() -> FeatureSet {
        let mut set = FeatureSet::empty();
        set.set(FeatureSet::INSTANCING, Self::INSTANCING);
        set.set(FeatureSet::MOTION, Self::MOTION);
        set.set(FeatureSet::HAIR, Self::HAIR);
        set.set(FeatureSet::POINTCLOUD, Self::POINTCLOUD);
        set
    }
}

macro_rules! features {
    ($(#[$meta:meta])* $name:ident, $inst:literal, $motion:literal, $hair:literal, $points:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Features for $name {
            const INSTANCING: bool = $inst;
            const MOTION: bool = $motion;
            const HAIR: bool = $hair;
            const POINTCLOUD: bool = $points;
            const NAME: &'static str = stringify!($name);
        }
    };
}

features!(
    /// Static triangles only.
    Minimal, false, false, false, false
);
features!(
    /// Static triangles and instancing.
    Instanced, true, false, false, false
);
features!(
    /// Instancing and motion blur.
    InstancedMotion, true, true, false, false
);
features!(
    /// Everything.
    Full, true, true, true, true
);

/// Which pre-specialised traversal a kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// [`Minimal`].
    Minimal,
    /// [`Instanced`].
    Instanced,
    /// [`InstancedMotion`].
    InstancedMotion,
    /// [`Full`].
    Full,
}

impl Variant {
    /// Smallest variant covering `required`.
    pub fn select(required: FeatureSet) -> Self {
        if Minimal::supported().contains(required) {
            Variant::Minimal
        } else if Instanced::supported().contains(required) {
            Variant::Instanced
        } else if InstancedMotion::supported().contains(required) {
            Variant::InstancedMotion
        } else {
            Variant::Full
        }
    }

    /// Features compiled into this variant.
    pub fn supported(self) -> FeatureSet {
        match self {
            Variant::Minimal => Minimal::supported(),
            Variant::Instanced => Instanced::supported(),
            Variant::InstancedMotion => InstancedMotion::supported(),
            Variant::Full => Full::supported(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_smallest() {
        assert_eq!(Variant::select(FeatureSet::empty()), Variant::Minimal);
        assert_eq!(Variant::select(FeatureSet::INSTANCING), Variant::Instanced);
        assert_eq!(Variant::select(FeatureSet::MOTION), Variant::InstancedMotion);
        assert_eq!(
            Variant::select(FeatureSet::INSTANCING | FeatureSet::MOTION),
            Variant::InstancedMotion
        );
        assert_eq!(Variant::select(FeatureSet::HAIR), Variant::Full);
        assert_eq!(Variant::select(FeatureSet::POINTCLOUD), Variant::Full);
    }

    #[test]
    fn test_selected_variant_covers_scene() {
        for bits in 0..16 {
            let required = FeatureSet::from_bits_truncate(bits);
            assert!(Variant::select(required).supported().contains(required));
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Full::NAME, "Full");
        assert_eq!(InstancedMotion::NAME, "InstancedMotion");
    }
}
