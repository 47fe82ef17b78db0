//! In-memory scene graph: entity handles, parent/child hierarchy and
//! local TRS transforms composed into world matrices.

use std::str::FromStr;

use glam::{Mat4, Quat, Vec3};
use slotmap::{new_key_type, SlotMap};

use crate::error::{Error, Result};
use crate::mesh::Mesh;

new_key_type! {
    /// Stable handle for scene entities backed by a generational slot map.
    pub struct EntityId;
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub name: String,
    pub classes: Vec<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mesh: Option<Mesh>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Entity {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            classes: Vec::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

pub struct Scene {
    entities: SlotMap<EntityId, Entity>,
    generation: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            generation: 0,
        }
    }

    pub fn spawn(&mut self, name: &str) -> EntityId {
        self.generation += 1;
        self.entities.insert(Entity::new(name))
    }

    pub fn spawn_child(&mut self, parent: EntityId, name: &str) -> Result<EntityId> {
        if !self.entities.contains_key(parent) {
            return Err(Error::UnknownEntity);
        }
        let id = self.spawn(name);
        self.set_parent(id, Some(parent))?;
        Ok(id)
    }

    /// Removes the entity and its whole subtree.
    pub fn despawn(&mut self, id: EntityId) {
        if !self.entities.contains_key(id) {
            return;
        }
        let _ = self.set_parent(id, None);
        for entity in self.descendants(id) {
            self.entities.remove(entity);
        }
        self.generation += 1;
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Bumped on every structural change (spawn, despawn, re-parent, class edit).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn add_class(&mut self, id: EntityId, class: &str) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        if !entity.classes.iter().any(|c| c == class) {
            entity.classes.push(class.to_string());
            self.generation += 1;
        }
        Ok(())
    }

    pub fn has_class(&self, id: EntityId, class: &str) -> bool {
        self.entities
            .get(id)
            .map_or(false, |e| e.classes.iter().any(|c| c == class))
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| id)
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.entities.get(id).map_or(&[], |e| e.children.as_slice())
    }

    /// Moves `child` under `parent` (or to the root) keeping its local transform.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<()> {
        if !self.entities.contains_key(child) {
            return Err(Error::UnknownEntity);
        }
        if let Some(p) = parent {
            if !self.entities.contains_key(p) {
                return Err(Error::UnknownEntity);
            }
            if p == child || self.is_descendant(p, child) {
                return Err(Error::ParentCycle);
            }
        }

        if let Some(old) = self.entities[child].parent {
            if let Some(old_parent) = self.entities.get_mut(old) {
                old_parent.children.retain(|&c| c != child);
            }
        }
        self.entities[child].parent = parent;
        if let Some(p) = parent {
            self.entities[p].children.push(child);
        }
        self.generation += 1;
        Ok(())
    }

    /// True when `id` sits anywhere below `ancestor`.
    pub fn is_descendant(&self, id: EntityId, ancestor: EntityId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Pre-order walk of the subtree rooted at `root`, `root` first.
    pub fn descendants(&self, root: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        if !self.entities.contains_key(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn local_matrix(&self, id: EntityId) -> Option<Mat4> {
        self.entities.get(id).map(Entity::local_matrix)
    }

    pub fn world_matrix(&self, id: EntityId) -> Option<Mat4> {
        let entity = self.entities.get(id)?;
        let mut world = entity.local_matrix();
        let mut cursor = entity.parent;
        while let Some(parent) = cursor {
            let p = self.entities.get(parent)?;
            world = p.local_matrix() * world;
            cursor = p.parent;
        }
        Some(world)
    }

    /// World matrix of the entity's parent, identity at the root.
    pub fn parent_world_matrix(&self, id: EntityId) -> Option<Mat4> {
        match self.entities.get(id)?.parent {
            Some(parent) => self.world_matrix(parent),
            None => Some(Mat4::IDENTITY),
        }
    }

    pub fn world_position(&self, id: EntityId) -> Option<Vec3> {
        self.world_matrix(id).map(|m| m.w_axis.truncate())
    }

    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(id).map(|e| e.translation)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        entity.translation = position;
        Ok(())
    }

    pub fn translate(&mut self, id: EntityId, delta: Vec3) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        entity.translation += delta;
        Ok(())
    }

    pub fn rotation(&self, id: EntityId) -> Option<Quat> {
        self.entities.get(id).map(|e| e.rotation)
    }

    pub fn set_rotation(&mut self, id: EntityId, rotation: Quat) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        entity.rotation = rotation.normalize();
        Ok(())
    }

    pub fn set_scale(&mut self, id: EntityId, scale: Vec3) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        entity.scale = scale;
        Ok(())
    }

    /// Decomposes `local` into the entity's TRS. Shear is discarded.
    pub fn set_local_matrix(&mut self, id: EntityId, local: Mat4) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        let (scale, rotation, translation) = local.to_scale_rotation_translation();
        entity.scale = scale;
        entity.rotation = rotation.normalize();
        entity.translation = translation;
        Ok(())
    }

    pub fn mesh(&self, id: EntityId) -> Option<&Mesh> {
        self.entities.get(id).and_then(|e| e.mesh.as_ref())
    }

    /// Replaces the entity's geometry. Cached bounds are not touched; callers
    /// invalidate them.
    pub fn set_mesh(&mut self, id: EntityId, mesh: Option<Mesh>) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity)?;
        entity.mesh = mesh;
        Ok(())
    }

    pub fn select(&self, selectors: &SelectorList) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| selectors.matches(e))
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`Scene::select`] but restricted to the subtree under `root`.
    pub fn select_within(&self, root: EntityId, selectors: &SelectorList) -> Vec<EntityId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.entities.get(id).map_or(false, |e| selectors.matches(e)))
            .collect()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// A single entity query: `#name`, `.class` or `*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Name(String),
    Class(String),
    Any,
}

impl Selector {
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Selector::Name(name) => entity.name == *name,
            Selector::Class(class) => entity.classes.iter().any(|c| c == class),
            Selector::Any => true,
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let valid = |ident: &str| {
            !ident.is_empty()
                && ident
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };

        if s == "*" {
            Ok(Selector::Any)
        } else if let Some(name) = s.strip_prefix('#').filter(|n| valid(n)) {
            Ok(Selector::Name(name.to_string()))
        } else if let Some(class) = s.strip_prefix('.').filter(|c| valid(c)) {
            Ok(Selector::Class(class.to_string()))
        } else {
            Err(Error::InvalidSelector(s.to_string()))
        }
    }
}

/// Comma-separated union of selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorList(Vec<Selector>);

impl SelectorList {
    pub fn matches(&self, entity: &Entity) -> bool {
        self.0.iter().any(|s| s.matches(entity))
    }
}

impl FromStr for SelectorList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::InvalidSelector(s.to_string()));
        }
        s.split(',')
            .map(str::parse::<Selector>)
            .collect::<Result<Vec<_>>>()
            .map(SelectorList)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let rig = scene.spawn("rig");
        let hand = scene.spawn_child(rig, "hand").unwrap();
        scene.set_position(rig, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_rotation(rig, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)).unwrap();
        scene.set_position(hand, Vec3::new(0.0, 0.0, -1.0)).unwrap();

        // -Z rotated a quarter turn about +Y lands on -X.
        let p = scene.world_position(hand).unwrap();
        assert!((p - Vec3::new(0.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = Scene::new();
        let a = scene.spawn("a");
        let b = scene.spawn_child(a, "b").unwrap();
        let c = scene.spawn_child(b, "c").unwrap();

        assert!(matches!(scene.set_parent(a, Some(c)), Err(Error::ParentCycle)));
        assert!(matches!(scene.set_parent(a, Some(a)), Err(Error::ParentCycle)));
        assert!(scene.set_parent(c, Some(a)).is_ok());
        assert_eq!(scene.children(b), &[] as &[EntityId]);
        assert_eq!(scene.children(a), &[b, c]);
    }

    #[test]
    fn test_despawn_removes_subtree() {
        let mut scene = Scene::new();
        let root = scene.spawn("root");
        let a = scene.spawn_child(root, "a").unwrap();
        let b = scene.spawn_child(a, "b").unwrap();

        scene.despawn(a);
        assert!(scene.contains(root));
        assert!(!scene.contains(a));
        assert!(!scene.contains(b));
        assert!(scene.children(root).is_empty());
    }

    #[test]
    fn test_set_local_matrix_round_trips_trs() {
        let mut scene = Scene::new();
        let e = scene.spawn("e");
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 0.5),
            Quat::from_rotation_x(0.3),
            Vec3::new(1.0, 2.0, 3.0),
        );
        scene.set_local_matrix(e, m).unwrap();
        assert!(scene.local_matrix(e).unwrap().abs_diff_eq(m, 1e-5));
    }

    #[test]
    fn test_selectors() {
        let mut scene = Scene::new();
        let rig = scene.spawn("rig");
        let left = scene.spawn_child(rig, "left-hand").unwrap();
        let right = scene.spawn_child(rig, "right-hand").unwrap();
        let other = scene.spawn("other");
        scene.add_class(left, "hand").unwrap();
        scene.add_class(right, "hand").unwrap();
        scene.add_class(other, "hand").unwrap();

        let hands: SelectorList = ".hand".parse().unwrap();
        assert_eq!(scene.select(&hands).len(), 3);
        assert_eq!(scene.select_within(rig, &hands), vec![left, right]);

        let named: SelectorList = "#left-hand, #right-hand".parse().unwrap();
        assert_eq!(scene.select_within(rig, &named), vec![left, right]);

        assert!("hand".parse::<SelectorList>().is_err());
        assert!("#".parse::<SelectorList>().is_err());
        assert!("".parse::<SelectorList>().is_err());
        assert!("#a,,#b".parse::<SelectorList>().is_err());
    }

    #[test]
    fn test_generation_tracks_structure() {
        let mut scene = Scene::new();
        let g0 = scene.generation();
        let a = scene.spawn("a");
        let g1 = scene.generation();
        assert!(g1 > g0);

        scene.set_position(a, Vec3::ONE).unwrap();
        assert_eq!(scene.generation(), g1);

        scene.add_class(a, "x").unwrap();
        assert!(scene.generation() > g1);
    }
}
