//! Grab/climb behavior: resolves a target on the start event and keeps it
//! kinematically attached until the end event.

use tracing::{debug, warn};

use crate::attach::{AttachMode, Attachment, AttachmentState, RegrabPolicy};
use crate::behavior::{bind, Behavior};
use crate::bounds::BoundingSphere;
use crate::config::GrabConfig;
use crate::events::{Event, ListenerId, Subscription, DROPPED, FAR, GRABBED, NEAR};
use crate::grab::{resolve, GrabCandidate, Pick};
use crate::scene::{EntityId, SelectorList};
use crate::scheduler::FrameTask;
use crate::simulation::Host;

struct GrabHand {
    attachment: Attachment,
    listening: Option<(Subscription, Subscription)>,
    near: Option<EntityId>,
}

pub struct Grabber {
    config: GrabConfig,
    candidate_selector: Option<SelectorList>,
    hands: Vec<GrabHand>,
    rig: Option<EntityId>,
    candidates: Vec<EntityId>,
    candidates_generation: Option<u64>,
    proximity_task: Option<FrameTask>,
    inert: bool,
    enabled: bool,
}

impl Grabber {
    pub fn new(config: GrabConfig, owner: Option<EntityId>, host: &mut Host) -> Self {
        let setup = config.validate().and_then(|_| {
            let bindings = bind(&host.scene, config.scope, owner, &config.hands, &config.rig)?;
            let candidates: SelectorList = config.candidates.parse()?;
            Ok((bindings, candidates))
        });

        let mut grabber = Self {
            candidate_selector: None,
            hands: Vec::new(),
            rig: None,
            candidates: Vec::new(),
            candidates_generation: None,
            proximity_task: None,
            inert: false,
            enabled: false,
            config,
        };

        match setup {
            Ok((bindings, selector)) => {
                if bindings.hands.is_empty() {
                    debug!(selector = %grabber.config.hands, "grabber matched no hands");
                }
                if grabber.config.mode == AttachMode::Rig && bindings.rig.is_none() {
                    debug!("climbing grabber has no rig; grabs will be ignored");
                }
                let mode = grabber.config.mode;
                grabber.rig = bindings.rig;
                grabber.candidate_selector = Some(selector);
                grabber.hands = bindings
                    .hands
                    .into_iter()
                    .map(|hand| GrabHand {
                        attachment: Attachment::new(hand, mode),
                        listening: None,
                        near: None,
                    })
                    .collect();
            }
            Err(e) => {
                warn!(error = %e, "grabber left inert");
                grabber.inert = true;
            }
        }

        if grabber.config.enabled {
            grabber.set_enabled(true, host);
        }
        grabber
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub fn mode(&self) -> AttachMode {
        self.config.mode
    }

    pub fn rig(&self) -> Option<EntityId> {
        self.rig
    }

    pub fn hands(&self) -> Vec<EntityId> {
        self.hands.iter().map(|h| h.attachment.hand()).collect()
    }

    pub fn state(&self, hand: EntityId) -> Option<AttachmentState> {
        self.slot(hand).map(|i| self.hands[i].attachment.state())
    }

    pub fn target(&self, hand: EntityId) -> Option<EntityId> {
        self.slot(hand).and_then(|i| self.hands[i].attachment.target())
    }

    pub fn near(&self, hand: EntityId) -> Option<EntityId> {
        self.slot(hand).and_then(|i| self.hands[i].near)
    }

    /// Candidate entities as of the last refresh.
    pub fn candidates(&self) -> &[EntityId] {
        &self.candidates
    }

    /// Releases whatever `hand` holds, as if its end event had fired.
    pub fn release(&mut self, hand: EntityId, host: &mut Host) -> Option<EntityId> {
        let index = self.slot(hand)?;
        self.release_slot(index, host)
    }

    pub fn release_all(&mut self, host: &mut Host) {
        for index in 0..self.hands.len() {
            self.release_slot(index, host);
        }
    }

    /// Resolves what `hand` would grab right now without grabbing it.
    pub fn probe(&mut self, hand: EntityId, host: &mut Host) -> Option<Pick> {
        let index = self.slot(hand)?;
        self.pick_for(index, host)
    }

    fn slot(&self, hand: EntityId) -> Option<usize> {
        self.hands.iter().position(|h| h.attachment.hand() == hand)
    }

    fn refresh_candidates(&mut self, host: &Host) {
        let generation = host.scene.generation();
        if self.candidates_generation == Some(generation) {
            return;
        }
        if let Some(selector) = &self.candidate_selector {
            self.candidates = host.scene.select(selector);
            debug!(count = self.candidates.len(), "grab candidates rebuilt");
        }
        self.candidates_generation = Some(generation);
    }

    fn hand_sphere(&self, hand: EntityId, host: &mut Host) -> Option<BoundingSphere> {
        let world = host.scene.world_matrix(hand)?;
        let volume = host.bounds.compute_if_missing(&host.scene, hand);
        if volume.is_empty() {
            Some(BoundingSphere::new(world.w_axis.truncate(), self.config.hand_radius))
        } else {
            Some(volume.sphere.transformed(&world))
        }
    }

    fn pick_for(&mut self, index: usize, host: &mut Host) -> Option<Pick> {
        self.refresh_candidates(host);
        let hand = self.hands[index].attachment.hand();
        let sphere = self.hand_sphere(hand, host)?;

        // Carried objects belong to one hand at a time.
        let held: Vec<EntityId> = match self.config.mode {
            AttachMode::Object => self
                .hands
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != index)
                .filter_map(|(_, h)| h.attachment.target())
                .collect(),
            AttachMode::Rig => Vec::new(),
        };

        let scene = &host.scene;
        let bounds = &mut host.bounds;
        let candidates: Vec<GrabCandidate> = self
            .candidates
            .iter()
            .copied()
            .filter(|&c| {
                c != hand
                    && !held.contains(&c)
                    && !scene.is_descendant(hand, c)
                    && !scene.is_descendant(c, hand)
            })
            .filter_map(|c| {
                let world = scene.world_matrix(c)?;
                Some(GrabCandidate::new(c, bounds.compute_if_missing(scene, c), world))
            })
            .collect();

        Some(resolve(&sphere, &candidates))
    }

    fn grab_start(&mut self, index: usize, host: &mut Host) {
        let hand = self.hands[index].attachment.hand();
        if self.hands[index].attachment.is_grabbing() {
            match self.config.regrab {
                RegrabPolicy::Ignore => {
                    debug!(?hand, "already grabbing; start ignored");
                    return;
                }
                RegrabPolicy::Replace => {
                    self.release_slot(index, host);
                }
            }
        }

        let Some(pick) = self.pick_for(index, host) else {
            return;
        };
        let Some(target) = pick.target else {
            debug!(?hand, tested = pick.narrow_tested, "nothing in reach");
            return;
        };

        if self.config.mode == AttachMode::Rig {
            // One climbing hand per rig: the new grip takes over.
            for other in 0..self.hands.len() {
                if other != index {
                    self.release_slot(other, host);
                }
            }
        }

        let task = host.scheduler.start(format!("grab:{hand:?}"));
        if !self.hands[index]
            .attachment
            .begin(&host.scene, target, self.rig, task)
        {
            debug!(?hand, ?target, "grab could not be captured");
            return;
        }

        host.events.emit(Event::new(GRABBED, target).with_counterpart(hand));
        host.events.emit(Event::new(GRABBED, hand).with_counterpart(target));
    }

    fn release_slot(&mut self, index: usize, host: &mut Host) -> Option<EntityId> {
        let hand = self.hands[index].attachment.hand();
        let target = self.hands[index].attachment.end()?;
        host.events.emit(Event::new(DROPPED, target).with_counterpart(hand));
        host.events.emit(Event::new(DROPPED, hand).with_counterpart(target));
        Some(target)
    }

    fn update_proximity(&mut self, host: &mut Host) {
        for index in 0..self.hands.len() {
            if self.hands[index].attachment.is_grabbing() {
                continue;
            }
            let hand = self.hands[index].attachment.hand();
            let nearest = self.pick_for(index, host).and_then(|p| p.target);
            let previous = self.hands[index].near;
            if nearest == previous {
                continue;
            }
            if let Some(old) = previous {
                host.events.emit(Event::new(FAR, hand).with_counterpart(old));
            }
            if let Some(new) = nearest {
                host.events.emit(Event::new(NEAR, hand).with_counterpart(new));
            }
            self.hands[index].near = nearest;
        }
    }
}

impl Behavior for Grabber {
    fn on_event(&mut self, _event: &Event, deliveries: &[ListenerId], host: &mut Host) {
        for index in 0..self.hands.len() {
            let (starts, ends) = match &self.hands[index].listening {
                Some((start, end)) => (start.hears(deliveries), end.hears(deliveries)),
                None => continue,
            };
            if starts {
                self.grab_start(index, host);
            } else if ends {
                self.release_slot(index, host);
            }
        }
    }

    fn tick(&mut self, _dt: f32, host: &mut Host) {
        if !self.enabled {
            return;
        }
        for index in 0..self.hands.len() {
            let attachment = &self.hands[index].attachment;
            if !attachment.is_grabbing() {
                continue;
            }
            if !attachment.track(&mut host.scene, self.rig) {
                debug!(hand = ?attachment.hand(), "grab lost its target");
                self.release_slot(index, host);
            }
        }
        if self.proximity_task.is_some() {
            self.update_proximity(host);
        }
    }

    fn set_enabled(&mut self, enabled: bool, host: &mut Host) {
        if self.inert {
            return;
        }
        self.enabled = enabled;

        if enabled {
            for hand in &mut self.hands {
                if hand.listening.is_none() {
                    let entity = hand.attachment.hand();
                    hand.listening = Some((
                        host.events.subscribe(entity, &self.config.start_event),
                        host.events.subscribe(entity, &self.config.end_event),
                    ));
                }
            }
            if self.config.proximity && self.proximity_task.is_none() {
                self.proximity_task = Some(host.scheduler.start("grab-proximity"));
            }
        } else {
            self.release_all(host);
            for hand in &mut self.hands {
                hand.listening = None;
                hand.near = None;
            }
            self.proximity_task = None;
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
