// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene graph: drawable objects over shared geometry and material arenas.
//!
//! Objects reference geometries and materials by id, so one material used by
//! a thousand star sprites is stored, and disposed, once. The arenas are the
//! only owners of backend resources; [`SceneGraph::dispose`] drains them.

use std::collections::BTreeMap;

use glam::Mat4;
use tracing::warn;

use crate::{RenderTarget, SceneError};

/// Key of a geometry in a [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeometryId(u32);

/// Key of a material in a [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(u32);

/// Key of an object in a [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

/// One drawable node: a geometry/material pair with a local transform.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    /// Debug name.
    pub name: String,
    /// Geometry drawn by this object.
    pub geometry: GeometryId,
    /// Material drawn with.
    pub material: MaterialId,
    /// Parent object; world transform composes up the chain.
    pub parent: Option<ObjectId>,
    /// Transform relative to the parent.
    pub transform: Mat4,
    /// Hidden objects (and their descendants) are skipped by renderers.
    pub visible: bool,
}

/// Borrowed view of one object ready to draw.
pub struct DrawItem<'a, T: RenderTarget> {
    /// Object key.
    pub id: ObjectId,
    /// Object data.
    pub object: &'a SceneObject,
    /// Transform composed with every ancestor.
    pub world_transform: Mat4,
    /// Geometry resource.
    pub geometry: &'a T::Geometry,
    /// Material resource.
    pub material: &'a T::Material,
}

/// Counts from a [`SceneGraph::dispose`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisposalReport {
    /// Objects dropped.
    pub objects: usize,
    /// Geometries handed to the target for deletion.
    pub geometries: usize,
    /// Materials handed to the target for deletion.
    pub materials: usize,
    /// Deletions the target reported as failed (already logged).
    pub failures: Vec<String>,
}

/// Tree of drawable objects for one allocation epoch.
pub struct SceneGraph<T: RenderTarget> {
    geometries: BTreeMap<GeometryId, T::Geometry>,
    materials: BTreeMap<MaterialId, T::Material>,
    objects: BTreeMap<ObjectId, SceneObject>,
    next_id: u32,
}

impl<T: RenderTarget> Default for SceneGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RenderTarget> SceneGraph<T> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            geometries: BTreeMap::new(),
            materials: BTreeMap::new(),
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn bump(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Take ownership of a backend geometry.
    pub fn add_geometry(&mut self, geometry: T::Geometry) -> GeometryId {
        let id = GeometryId(self.bump());
        self.geometries.insert(id, geometry);
        id
    }

    /// Take ownership of a backend material.
    pub fn add_material(&mut self, material: T::Material) -> MaterialId {
        let id = MaterialId(self.bump());
        self.materials.insert(id, material);
        id
    }

    /// Add a root-level object.
    pub fn add_object(
        &mut self,
        name: impl Into<String>,
        geometry: GeometryId,
        material: MaterialId,
    ) -> Result<ObjectId, SceneError> {
        self.insert_object(name.into(), geometry, material, None)
    }

    /// Add an object under `parent`.
    pub fn add_child(
        &mut self,
        parent: ObjectId,
        name: impl Into<String>,
        geometry: GeometryId,
        material: MaterialId,
    ) -> Result<ObjectId, SceneError> {
        if !self.objects.contains_key(&parent) {
            return Err(SceneError::Backend(format!("unknown parent {parent:?}")));
        }
        self.insert_object(name.into(), geometry, material, Some(parent))
    }

    fn insert_object(
        &mut self,
        name: String,
        geometry: GeometryId,
        material: MaterialId,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId, SceneError> {
        if !self.geometries.contains_key(&geometry) {
            return Err(SceneError::Backend(format!("unknown geometry {geometry:?}")));
        }
        if !self.materials.contains_key(&material) {
            return Err(SceneError::Backend(format!("unknown material {material:?}")));
        }
        let id = ObjectId(self.bump());
        self.objects.insert(
            id,
            SceneObject {
                name,
                geometry,
                material,
                parent,
                transform: Mat4::IDENTITY,
                visible: true,
            },
        );
        Ok(id)
    }

    /// Remove an object and all of its descendants.
    ///
    /// Geometries and materials stay in the arenas (other objects may share
    /// them) and are released by [`SceneGraph::dispose`].
    pub fn remove_object(&mut self, id: ObjectId) -> usize {
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            let children: Vec<ObjectId> = self
                .objects
                .iter()
                .filter(|(child, o)| o.parent == Some(current) && !doomed.contains(*child))
                .map(|(child, _)| *child)
                .collect();
            doomed.extend(children);
            i += 1;
        }
        let mut removed = 0;
        for d in doomed {
            if self.objects.remove(&d).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Object by key.
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Mutable object by key.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Geometry by key.
    pub fn geometry(&self, id: GeometryId) -> Option<&T::Geometry> {
        self.geometries.get(&id)
    }

    /// Mutable geometry by key (e.g. to rewrite particle positions).
    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut T::Geometry> {
        self.geometries.get_mut(&id)
    }

    /// Material by key.
    pub fn material(&self, id: MaterialId) -> Option<&T::Material> {
        self.materials.get(&id)
    }

    /// Mutable material by key (e.g. to animate a uniform).
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut T::Material> {
        self.materials.get_mut(&id)
    }

    /// Iterate objects in key order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    /// Number of retained objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of retained geometries.
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Number of retained materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// True when nothing at all is retained.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.geometries.is_empty() && self.materials.is_empty()
    }

    /// Transform of `id` composed with all ancestors. `None` for unknown ids.
    pub fn world_transform(&self, id: ObjectId) -> Option<Mat4> {
        let mut object = self.objects.get(&id)?;
        let mut transform = object.transform;
        // Depth is bounded by the object count; guards against a parent cycle.
        for _ in 0..self.objects.len() {
            match object.parent.and_then(|p| self.objects.get(&p)) {
                Some(parent) => {
                    transform = parent.transform * transform;
                    object = parent;
                }
                None => break,
            }
        }
        Some(transform)
    }

    fn effectively_visible(&self, object: &SceneObject) -> bool {
        let mut current = Some(object);
        for _ in 0..=self.objects.len() {
            match current {
                Some(o) if !o.visible => return false,
                Some(o) => current = o.parent.and_then(|p| self.objects.get(&p)),
                None => return true,
            }
        }
        true
    }

    /// Objects to draw this frame, with resolved world transforms.
    pub fn draw_items(&self) -> impl Iterator<Item = DrawItem<'_, T>> {
        self.objects.iter().filter_map(move |(id, object)| {
            if !self.effectively_visible(object) {
                return None;
            }
            Some(DrawItem {
                id: *id,
                object,
                world_transform: self.world_transform(*id)?,
                geometry: self.geometries.get(&object.geometry)?,
                material: self.materials.get(&object.material)?,
            })
        })
    }

    /// Drop every object and hand every geometry and material to `target`
    /// for deletion, each exactly once.
    ///
    /// Never fails: a failed deletion is logged and recorded in the report
    /// and the pass continues with the remaining resources.
    pub fn dispose(&mut self, target: &mut T) -> DisposalReport {
        let mut report = DisposalReport {
            objects: self.objects.len(),
            ..DisposalReport::default()
        };
        self.objects.clear();

        for (id, geometry) in std::mem::take(&mut self.geometries) {
            report.geometries += 1;
            if let Err(err) = target.dispose_geometry(geometry) {
                warn!(?id, %err, "geometry disposal failed");
                report.failures.push(format!("{id:?}: {err}"));
            }
        }
        for (id, material) in std::mem::take(&mut self.materials) {
            report.materials += 1;
            if let Err(err) = target.dispose_material(material) {
                warn!(?id, %err, "material disposal failed");
                report.failures.push(format!("{id:?}: {err}"));
            }
        }
        report
    }

    /// Drop everything without issuing GPU deletes (the context is gone).
    pub fn abandon(&mut self) -> usize {
        let dropped = self.objects.len();
        self.objects.clear();
        self.geometries.clear();
        self.materials.clear();
        dropped
    }
}
