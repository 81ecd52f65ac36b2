//! Task queue construction: enumerate, filter, measure, emit.
//!
//! The builder walks the scene in stable enumeration order so repeated runs
//! over an unchanged scene produce identical queues. It excludes instancing
//! templates wholesale, protects small meshes, and turns hidden entities
//! into floor-level tasks rather than skipping them.

use rustc_hash::FxHashMap;
use tracing::debug;

use vantage_policy::{
    LodLevel, LodPolicy, Measurement, ScreenCoverage, bucketed_target, measure_coverage,
    required_pixels,
};
use vantage_scene::{CameraState, EntityId, SceneGraph};

use crate::task::{Task, TaskId, TaskKind, TaskParams};

/// What a batch has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchRequest {
    /// Resize every eligible image to one fixed target.
    ResizeImages {
        /// Target edge length in pixels.
        target_px: u32,
    },
    /// Size each image by the screen coverage of the meshes that use it.
    OptimizeByCamera {
        /// Upper cap on any computed target.
        max_size_px: u32,
    },
    /// Recompute geometry reduction factors by camera distance.
    UpdateGeometry,
    /// Rescale shader detail scalars by camera distance.
    UpdateShaders,
    /// Reassign viewport display modes by camera distance.
    UpdateViewport,
    /// Everything: geometry, shaders, viewport, camera-sized images.
    OptimizeAll {
        /// Upper cap on any computed image target.
        max_size_px: u32,
    },
}

/// Filtering knobs for queue construction.
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// Meshes with fewer faces are skipped for geometry tasks unless a
    /// reduction is already applied to them.
    pub min_face_guard: u32,
}

/// Result of building a queue.
#[derive(Debug)]
pub enum BuildOutcome {
    /// An ordered, non-empty task list plus the number of filtered entities.
    Tasks {
        /// Tasks in execution order.
        tasks: Vec<Task>,
        /// Entities excluded by filtering.
        skipped: usize,
    },
    /// Every candidate was filtered out; no batch should start.
    NothingToDo,
}

/// Queue construction errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The request measures against a camera, but the scene has none.
    #[error("no active camera in the scene")]
    NoCamera,
}

/// Builds ordered task lists from a scene.
pub struct TaskQueueBuilder<'a> {
    scene: &'a dyn SceneGraph,
    policy: &'a LodPolicy,
    filter: FilterConfig,
    next_id: u64,
}

impl<'a> TaskQueueBuilder<'a> {
    /// Create a builder over a scene with the given policy and filter.
    pub fn new(scene: &'a dyn SceneGraph, policy: &'a LodPolicy, filter: FilterConfig) -> Self {
        Self {
            scene,
            policy,
            filter,
            next_id: 0,
        }
    }

    /// Build the ordered task list for a request.
    pub fn build(mut self, request: BatchRequest) -> Result<BuildOutcome, BuildError> {
        let mut tasks = Vec::new();
        let mut skipped = 0usize;

        if let BatchRequest::ResizeImages { target_px } = request {
            // The only request that works without a camera.
            self.push_uniform_image_tasks(target_px, &mut tasks, &mut skipped);
        } else {
            let Some(camera) = self.scene.camera() else {
                return Err(BuildError::NoCamera);
            };
            match request {
                BatchRequest::ResizeImages { .. } => {}
                BatchRequest::OptimizeByCamera { max_size_px } => {
                    self.push_coverage_image_tasks(&camera, max_size_px, &mut tasks, &mut skipped);
                }
                BatchRequest::UpdateGeometry => {
                    self.push_mesh_tasks(TaskKind::GeometryUpdate, &camera, &mut tasks, &mut skipped);
                }
                BatchRequest::UpdateShaders => {
                    self.push_mesh_tasks(TaskKind::ShaderUpdate, &camera, &mut tasks, &mut skipped);
                }
                BatchRequest::UpdateViewport => {
                    self.push_mesh_tasks(TaskKind::ViewportUpdate, &camera, &mut tasks, &mut skipped);
                }
                BatchRequest::OptimizeAll { max_size_px } => {
                    self.push_mesh_tasks(TaskKind::GeometryUpdate, &camera, &mut tasks, &mut skipped);
                    self.push_mesh_tasks(TaskKind::ShaderUpdate, &camera, &mut tasks, &mut skipped);
                    self.push_mesh_tasks(TaskKind::ViewportUpdate, &camera, &mut tasks, &mut skipped);
                    self.push_coverage_image_tasks(&camera, max_size_px, &mut tasks, &mut skipped);
                }
            }
        }

        debug!(tasks = tasks.len(), skipped, "task queue built");

        if tasks.is_empty() {
            Ok(BuildOutcome::NothingToDo)
        } else {
            Ok(BuildOutcome::Tasks { tasks, skipped })
        }
    }

    fn alloc(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    /// Mesh-entity tasks (geometry/shader/viewport), one per eligible mesh.
    fn push_mesh_tasks(
        &mut self,
        kind: TaskKind,
        camera: &CameraState,
        tasks: &mut Vec<Task>,
        skipped: &mut usize,
    ) {
        let instance_sources = self.scene.instance_sources();

        for id in self.scene.mesh_entities() {
            let Some(mesh) = self.scene.mesh_info(id) else {
                *skipped += 1;
                continue;
            };
            if instance_sources.contains(&id) {
                *skipped += 1;
                continue;
            }
            if kind == TaskKind::GeometryUpdate
                && mesh.face_count < self.filter.min_face_guard
                && !mesh.already_degraded
            {
                // Too small to ever degrade, and nothing to undo.
                *skipped += 1;
                continue;
            }

            let distance = (mesh.center() - camera.position).length();
            let level = if mesh.hidden {
                LodLevel::FARTHEST
            } else {
                self.policy.level_for(distance)
            };

            let params = match kind {
                TaskKind::GeometryUpdate => {
                    let measurement = if mesh.hidden {
                        Measurement::Coverage(ScreenCoverage::INVISIBLE)
                    } else {
                        Measurement::Distance(distance)
                    };
                    TaskParams::Geometry {
                        factor: self.policy.compute_factor(measurement, mesh.face_count),
                    }
                }
                TaskKind::ShaderUpdate => TaskParams::Shader { level },
                TaskKind::ViewportUpdate => TaskParams::Viewport { level },
                TaskKind::ImageResize => unreachable!("images are not mesh tasks"),
            };

            let id_alloc = self.alloc();
            tasks.push(Task::new(id_alloc, kind, id, params));
        }
    }

    /// One fixed-size resize task per eligible image.
    fn push_uniform_image_tasks(
        &mut self,
        target_px: u32,
        tasks: &mut Vec<Task>,
        skipped: &mut usize,
    ) {
        for id in self.scene.image_entities() {
            let Some(img) = self.scene.image_info(id) else {
                *skipped += 1;
                continue;
            };
            if img.generated || (img.path.is_none() && !img.packed) {
                *skipped += 1;
                continue;
            }
            let id_alloc = self.alloc();
            tasks.push(Task::new(
                id_alloc,
                TaskKind::ImageResize,
                id,
                TaskParams::Image { target_px },
            ));
        }
    }

    /// Coverage-driven resize tasks: each image takes the maximum
    /// requirement over every non-template mesh that references it.
    fn push_coverage_image_tasks(
        &mut self,
        camera: &CameraState,
        max_size_px: u32,
        tasks: &mut Vec<Task>,
        skipped: &mut usize,
    ) {
        let instance_sources = self.scene.instance_sources();
        let view_proj = camera.projection * camera.view;

        let mut requirements: FxHashMap<EntityId, f32> = FxHashMap::default();

        for mesh_id in self.scene.mesh_entities() {
            let Some(mesh) = self.scene.mesh_info(mesh_id) else {
                continue;
            };
            if instance_sources.contains(&mesh_id) {
                continue;
            }
            let cov = if mesh.hidden {
                ScreenCoverage::INVISIBLE
            } else {
                measure_coverage(&mesh.world_corners, view_proj, camera.resolution)
            };
            let required = required_pixels(cov, max_size_px);

            for img_id in self.scene.images_used_by(mesh_id) {
                let slot = requirements.entry(img_id).or_insert(0.0);
                if required > *slot {
                    *slot = required;
                }
            }
        }

        // Emit in image enumeration order, not map order.
        for id in self.scene.image_entities() {
            let Some(&required) = requirements.get(&id) else {
                continue;
            };
            let Some(img) = self.scene.image_info(id) else {
                *skipped += 1;
                continue;
            };
            if img.generated || (img.path.is_none() && !img.packed) {
                *skipped += 1;
                continue;
            }
            let target_px = bucketed_target(required, img.max_dimension());
            let id_alloc = self.alloc();
            tasks.push(Task::new(
                id_alloc,
                TaskKind::ImageResize,
                id,
                TaskParams::Image { target_px },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_policy::DistanceThresholds;
    use vantage_scene::{
        CameraDescription, ImageDescription, MemoryScene, MeshDescription, SceneDescription,
    };

    fn policy() -> LodPolicy {
        LodPolicy::new(DistanceThresholds::new(10.0, 25.0, 50.0), 0.1, 100)
    }

    fn mesh(name: &str, pos: [f32; 3], faces: u32) -> MeshDescription {
        MeshDescription {
            name: name.to_string(),
            position: pos,
            half_extent: [1.0, 1.0, 1.0],
            faces,
            vertices: faces / 2,
            hidden: false,
            instance_source: false,
            images: vec![],
            normal_strength: None,
            displacement_scale: None,
        }
    }

    fn scene_with(meshes: Vec<MeshDescription>, images: Vec<ImageDescription>) -> MemoryScene {
        MemoryScene::from_description(&SceneDescription {
            camera: CameraDescription {
                position: [0.0, 0.0, 0.0],
                look_at: [1.0, 0.0, 0.0],
                fov_deg: 50.0,
                resolution: [1920, 1080],
            },
            meshes,
            images,
            collections: vec![],
        })
    }

    #[test]
    fn test_instance_sources_are_excluded() {
        let mut template = mesh("template", [5.0, 0.0, 0.0], 5000);
        template.instance_source = true;
        let scene = scene_with(vec![template, mesh("rock", [5.0, 0.0, 0.0], 5000)], vec![]);

        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        match builder.build(BatchRequest::UpdateGeometry).unwrap() {
            BuildOutcome::Tasks { tasks, skipped } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(skipped, 1);
            }
            BuildOutcome::NothingToDo => panic!("expected tasks"),
        }
    }

    #[test]
    fn test_small_mesh_protected_unless_degraded() {
        let scene = scene_with(
            vec![mesh("tiny", [5.0, 0.0, 0.0], 50), mesh("big", [5.0, 0.0, 0.0], 5000)],
            vec![],
        );
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        match builder.build(BatchRequest::UpdateGeometry).unwrap() {
            BuildOutcome::Tasks { tasks, .. } => {
                assert_eq!(tasks.len(), 1);
            }
            BuildOutcome::NothingToDo => panic!("expected tasks"),
        }
    }

    #[test]
    fn test_hidden_mesh_gets_floor_task() {
        let mut hidden = mesh("hidden", [5.0, 0.0, 0.0], 5000);
        hidden.hidden = true;
        let scene = scene_with(vec![hidden], vec![]);
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        match builder.build(BatchRequest::UpdateGeometry).unwrap() {
            BuildOutcome::Tasks { tasks, .. } => {
                assert_eq!(tasks.len(), 1);
                match tasks[0].params {
                    TaskParams::Geometry { factor } => assert!((factor - 0.1).abs() < 1e-6),
                    _ => panic!("wrong params"),
                }
            }
            BuildOutcome::NothingToDo => panic!("expected a floor-level task"),
        }
    }

    #[test]
    fn test_empty_scene_is_nothing_to_do() {
        let scene = scene_with(vec![], vec![]);
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        assert!(matches!(
            builder.build(BatchRequest::UpdateGeometry).unwrap(),
            BuildOutcome::NothingToDo
        ));
    }

    #[test]
    fn test_generated_images_are_skipped() {
        let images = vec![
            ImageDescription {
                name: "render_buffer".to_string(),
                path: None,
                width: 1920,
                height: 1080,
                packed: false,
                generated: true,
            },
            ImageDescription {
                name: "wood".to_string(),
                path: Some("/tex/wood.png".into()),
                width: 2048,
                height: 2048,
                packed: false,
                generated: false,
            },
        ];
        let scene = scene_with(vec![], images);
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        match builder
            .build(BatchRequest::ResizeImages { target_px: 512 })
            .unwrap()
        {
            BuildOutcome::Tasks { tasks, skipped } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(skipped, 1);
            }
            BuildOutcome::NothingToDo => panic!("expected tasks"),
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let scene = scene_with(
            vec![
                mesh("a", [5.0, 0.0, 0.0], 5000),
                mesh("b", [30.0, 0.0, 0.0], 5000),
                mesh("c", [90.0, 0.0, 0.0], 5000),
            ],
            vec![],
        );
        let p = policy();
        let filter = FilterConfig { min_face_guard: 100 };

        let ids_of = |outcome: BuildOutcome| match outcome {
            BuildOutcome::Tasks { tasks, .. } => tasks
                .iter()
                .map(|t| (t.entity, t.kind))
                .collect::<Vec<_>>(),
            BuildOutcome::NothingToDo => vec![],
        };

        let first = ids_of(
            TaskQueueBuilder::new(&scene, &p, filter)
                .build(BatchRequest::UpdateGeometry)
                .unwrap(),
        );
        let second = ids_of(
            TaskQueueBuilder::new(&scene, &p, filter)
                .build(BatchRequest::UpdateGeometry)
                .unwrap(),
        );
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_camera_required_for_measured_requests() {
        // A scene built by hand has no camera until one is set.
        let mut scene = MemoryScene::new();
        scene.add_mesh(mesh("a", [5.0, 0.0, 0.0], 5000), vec![]);
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        assert!(matches!(
            builder.build(BatchRequest::UpdateGeometry),
            Err(BuildError::NoCamera)
        ));
    }

    #[test]
    fn test_coverage_requirement_takes_maximum() {
        let img = ImageDescription {
            name: "shared".to_string(),
            path: Some("/tex/shared.png".into()),
            width: 4096,
            height: 4096,
            packed: false,
            generated: false,
        };
        let mut near = mesh("near", [6.0, 0.0, 0.0], 5000);
        near.images = vec!["shared".to_string()];
        let mut far = mesh("far", [400.0, 0.0, 0.0], 5000);
        far.images = vec!["shared".to_string()];

        let scene = scene_with(vec![near, far], vec![img]);
        let p = policy();
        let builder = TaskQueueBuilder::new(&scene, &p, FilterConfig { min_face_guard: 100 });
        match builder
            .build(BatchRequest::OptimizeByCamera { max_size_px: 4096 })
            .unwrap()
        {
            BuildOutcome::Tasks { tasks, .. } => {
                assert_eq!(tasks.len(), 1);
                let TaskParams::Image { target_px } = tasks[0].params else {
                    panic!("wrong params");
                };
                // The near mesh dominates; the far mesh alone would have
                // produced a much smaller target.
                assert!(target_px >= 256, "target too small: {target_px}");
            }
            BuildOutcome::NothingToDo => panic!("expected tasks"),
        }
    }
}
