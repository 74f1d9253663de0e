//! The station CSMA/CA state machine, packet generation process, transmit
//! process, and the shared data-frame/ack reception process (§4.3–§4.5).
//!
//! Nodes live in one arena (`Vec<NodeState>` behind a shared `RefCell`)
//! addressed by `NodeId`, rather than holding back-pointers to each other
//! or to the Medium — see Design Notes §9 and [`crate::world::World`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use statrs::function::erf::erfc;

use crate::constants::*;
use crate::dbm::{dbm_to_mw, sub_dbm};
use crate::energy::EnergyHistory;
use crate::node_log;
use crate::scheduler::{Either, Event, select};
use crate::world::World;

pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacState {
    Idle,
    Cca,
    Difs,
    Backoff,
    Tx,
}

/// One node's MAC state, packet counter, energy history, and the one-shot
/// latches an in-flight CSMA/CA attempt is currently suspended on.
pub struct NodeState {
    pub id: NodeId,
    pub position: (f64, f64),
    /// `None` for the AP, which never contends for the medium.
    pub group: Option<u32>,
    pub mac_state: MacState,
    pub channel_idle: Option<Rc<Event>>,
    pub difs_action: Option<Rc<Event>>,
    pub backoff_action: Option<Rc<Event>>,
    pub ack_action: Option<Rc<Event>>,
    pub pkt_counter: u64,
    pub energy: EnergyHistory,
    pub last_success_at: Option<u64>,
}

impl NodeState {
    pub fn new(id: NodeId, position: (f64, f64), group: Option<u32>, now: u64) -> Self {
        NodeState {
            id,
            position,
            group,
            mac_state: MacState::Idle,
            channel_idle: None,
            difs_action: None,
            backoff_action: None,
            ack_action: None,
            pkt_counter: 0,
            energy: EnergyHistory::new(now),
            last_success_at: None,
        }
    }
}

/// Shared node arena. See module docs.
pub type Arena = Rc<RefCell<Vec<NodeState>>>;

pub fn new_arena() -> Arena {
    Rc::new(RefCell::new(Vec::new()))
}

fn index_of(arena: &Arena, id: NodeId) -> usize {
    arena
        .borrow()
        .iter()
        .position(|n| n.id == id)
        .unwrap_or_else(|| panic!("node {id} not registered in arena"))
}

fn log_node(world: &World, kind: &str, level: u8, now: u64, id: NodeId, args: fmt::Arguments) {
    let mut logger = world.logger.borrow_mut();
    node_log!(logger, kind, level, now, id, "{}", args);
}

/// Apply an energy increase to `id` from a transmitter contributing
/// `delta_dbm`, then wake whichever CSMA/CA wait the new level preempts
/// (§4.3's event-preemption wiring). Called by [`crate::medium::Medium`]
/// for every registered node, including the transmitter itself.
pub fn increase_received_energy(world: &World, id: NodeId, delta_dbm: f64) {
    let now = world.scheduler.now();
    let idx = index_of(&world.arena, id);

    let (old, new, active, to_wake) = {
        let mut arena = world.arena.borrow_mut();
        let node = &mut arena[idx];
        let old = node.energy.current_level();
        node.energy.increase(now, delta_dbm);
        let new = node.energy.current_level();
        let active = node.energy.active_transmitters();

        let mut to_wake = None;
        if new > CS_THRESHOLD {
            match node.mac_state {
                MacState::Difs => {
                    if let Some(ev) = &node.difs_action {
                        if !ev.is_triggered() {
                            to_wake = Some(ev.clone());
                        }
                    }
                }
                MacState::Backoff => {
                    if let Some(ev) = &node.backoff_action {
                        if !ev.is_triggered() {
                            to_wake = Some(ev.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        (old, new, active, to_wake)
    };

    log_node(
        world,
        "Ei",
        2,
        now,
        id,
        format_args!("{old} -> {new} [ {active} ]"),
    );
    if let Some(ev) = to_wake {
        ev.succeed();
    }
}

/// Mirror of [`increase_received_energy`] for a transmitter that just went
/// silent.
pub fn decrease_received_energy(world: &World, id: NodeId, delta_dbm: f64) {
    let now = world.scheduler.now();
    let idx = index_of(&world.arena, id);

    let (old, new, active, to_wake) = {
        let mut arena = world.arena.borrow_mut();
        let node = &mut arena[idx];
        let old = node.energy.current_level();
        node.energy.decrease(now, delta_dbm);
        let new = node.energy.current_level();
        let active = node.energy.active_transmitters();

        let mut to_wake = None;
        if new <= CS_THRESHOLD && node.mac_state == MacState::Cca {
            if let Some(ev) = &node.channel_idle {
                if !ev.is_triggered() {
                    to_wake = Some(ev.clone());
                }
            }
        }
        (old, new, active, to_wake)
    };

    log_node(
        world,
        "Ed",
        2,
        now,
        id,
        format_args!("{old} -> {new} [ {active} ]"),
    );
    if let Some(ev) = to_wake {
        ev.succeed();
    }
}

fn set_mac_state(world: &World, id: NodeId, state: MacState) {
    let idx = index_of(&world.arena, id);
    world.arena.borrow_mut()[idx].mac_state = state;
}

fn current_level(world: &World, id: NodeId) -> f64 {
    let idx = index_of(&world.arena, id);
    world.arena.borrow()[idx].energy.current_level()
}

fn node_group(world: &World, id: NodeId) -> Option<u32> {
    let idx = index_of(&world.arena, id);
    world.arena.borrow()[idx].group
}

fn last_success_at(world: &World, id: NodeId) -> Option<u64> {
    let idx = index_of(&world.arena, id);
    world.arena.borrow()[idx].last_success_at
}

fn set_last_success(world: &World, id: NodeId, when: u64) {
    let idx = index_of(&world.arena, id);
    world.arena.borrow_mut()[idx].last_success_at = Some(when);
}

fn draw_backoff(world: &World, cw: u32) -> u32 {
    world.rng.borrow_mut().gen_range(0..=cw)
}

/// Compute `(cycle, group_in_cycle)` for simulated time `t` under a cycle
/// of `g` groups each `s` microseconds long (§3, "Group schedule").
fn cycle_and_group(t: u64, g: u64, s: u64) -> (u64, u64) {
    let cycle_len = g * s;
    let cycle = t / cycle_len;
    let group_in_cycle = (t - cycle * cycle_len) / s;
    (cycle, group_in_cycle)
}

/// The per-station packet generation + CSMA/CA process (§4.3). Spawned once
/// per station; runs for the lifetime of the simulation, generating and
/// attempting to deliver one packet after another.
pub async fn run_station(world: World, id: NodeId) {
    loop {
        run_one_packet(&world, id).await;
    }
}

async fn run_one_packet(world: &World, id: NodeId) {
    // Step 1: inter-arrival.
    let delta = {
        let mut rng = world.rng.borrow_mut();
        let exp = Exp::new(world.config.rate).expect("packet rate must be positive");
        exp.sample(&mut *rng).max(0.0) as u64
    };
    world.scheduler.timeout(delta).await;
    let now = world.scheduler.now();
    let pkt_id = {
        let idx = index_of(&world.arena, id);
        let mut arena = world.arena.borrow_mut();
        let pid = arena[idx].pkt_counter;
        arena[idx].pkt_counter += 1;
        pid
    };
    log_node(world, "+", 0, now, id, format_args!("{pkt_id}"));

    // Step 2: group schedule gate.
    let own_group = node_group(world, id).expect("stations always have a group");
    let g = world.config.number_of_groups as u64;
    let s = world.config.slot_size;
    let (cycle, group_in_cycle) = cycle_and_group(now, g, s);

    let end_of_slot;
    if group_in_cycle != own_group as u64 {
        let target = if own_group as u64 > group_in_cycle {
            cycle * g * s + own_group as u64 * s
        } else {
            (cycle + 1) * g * s + own_group as u64 * s
        };
        let time_until_my_group = target - now;
        log_node(
            world,
            "D",
            0,
            now,
            id,
            format_args!("{pkt_id} {time_until_my_group}"),
        );
        world.scheduler.timeout(time_until_my_group).await;
        end_of_slot = world.scheduler.now() + s;
    } else {
        end_of_slot = (cycle * g + own_group as u64 + 1) * s;
        log_node(world, "G", 1, now, id, format_args!("{pkt_id} {end_of_slot}"));
    }

    // Step 3: contention window reset.
    let mut cw = CW_MIN;
    let mut attempts: u32 = 0;
    let mut needs_backoff = last_success_at(world, id) == Some(world.scheduler.now());
    let mut backoff_counter = draw_backoff(world, cw);
    log_node(
        world,
        "Cw",
        1,
        world.scheduler.now(),
        id,
        format_args!("{pkt_id} {cw}"),
    );

    // Step 4: inner attempt loop.
    loop {
        let now = world.scheduler.now();
        if now > end_of_slot {
            log_node(world, "A", 0, now, id, format_args!("{pkt_id}"));
            set_mac_state(world, id, MacState::Idle);
            return;
        }

        // (b) CCA.
        set_mac_state(world, id, MacState::Cca);
        if current_level(world, id) > CS_THRESHOLD {
            needs_backoff = true;
            log_node(world, "Ms", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
            let channel_idle = Rc::new(Event::new());
            let idx = index_of(&world.arena, id);
            world.arena.borrow_mut()[idx].channel_idle = Some(channel_idle.clone());
            channel_idle.wait().await;
            log_node(world, "Mi", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
        }

        // (c) DIFS.
        set_mac_state(world, id, MacState::Difs);
        log_node(world, "MDs", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
        let difs_action = Rc::new(Event::new());
        let idx = index_of(&world.arena, id);
        world.arena.borrow_mut()[idx].difs_action = Some(difs_action.clone());
        let difs_timeout = world.scheduler.timeout(DIFS);
        match select(difs_action.wait(), difs_timeout).await {
            Either::First(()) => {
                log_node(world, "MDi", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                needs_backoff = true;
                set_mac_state(world, id, MacState::Idle);
                continue;
            }
            Either::Second(()) => {
                log_node(world, "MDo", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
            }
        }

        // (d) Backoff.
        if needs_backoff {
            set_mac_state(world, id, MacState::Backoff);
            let backoff_start = world.scheduler.now();
            log_node(
                world,
                "Bs",
                0,
                backoff_start,
                id,
                format_args!("{pkt_id} {backoff_counter}"),
            );
            let backoff_action = Rc::new(Event::new());
            let idx = index_of(&world.arena, id);
            world.arena.borrow_mut()[idx].backoff_action = Some(backoff_action.clone());
            let backoff_timeout = world.scheduler.timeout(backoff_counter as u64 * SLOT_TIME);
            match select(backoff_action.wait(), backoff_timeout).await {
                Either::First(()) => {
                    log_node(world, "Bi", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                    let elapsed = world.scheduler.now() - backoff_start;
                    backoff_counter = backoff_counter.saturating_sub((elapsed / SLOT_TIME) as u32);
                    set_mac_state(world, id, MacState::Idle);
                    continue;
                }
                Either::Second(()) => {
                    log_node(world, "Bi", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                    log_node(world, "Bo", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                    needs_backoff = false;
                }
            }
        }

        // (e) Slot fit check.
        let now = world.scheduler.now();
        if now + DATA_PACKET_TIME > end_of_slot {
            log_node(world, "A", 0, now, id, format_args!("{pkt_id}"));
            set_mac_state(world, id, MacState::Idle);
            let (next_cycle, _) = cycle_and_group(now, g, s);
            let target = (next_cycle + 1) * g * s + own_group as u64 * s;
            world.scheduler.timeout(target - now).await;
            return;
        }

        // (f) Transmit.
        set_mac_state(world, id, MacState::Tx);
        transmit(world, id, pkt_id).await;

        // (g) Wait for ack.
        let ack_action = Rc::new(Event::new());
        let idx = index_of(&world.arena, id);
        world.arena.borrow_mut()[idx].ack_action = Some(ack_action.clone());
        let ack_timeout = world.scheduler.timeout(ACK_TIMEOUT);
        match select(ack_action.wait(), ack_timeout).await {
            Either::First(()) => {
                log_node(world, "S", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                set_last_success(world, id, world.scheduler.now());
                set_mac_state(world, id, MacState::Idle);
                return;
            }
            Either::Second(()) => {
                log_node(
                    world,
                    "Ato",
                    0,
                    world.scheduler.now(),
                    id,
                    format_args!("{pkt_id} [ack]"),
                );
                attempts += 1;
                if attempts > RETRY_LIMIT {
                    log_node(world, "D", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
                    set_mac_state(world, id, MacState::Idle);
                    return;
                }
                cw = (2 * (cw + 1) - 1).min(CW_MAX);
                backoff_counter = draw_backoff(world, cw);
                needs_backoff = true;
                log_node(world, "Cw", 1, world.scheduler.now(), id, format_args!("{pkt_id} {cw}"));
            }
        }
    }
}

/// Node — transmit (§4.4): announce the frame on the medium, spawn the
/// receiver's reception process at the same instant, hold the channel for
/// the frame's airtime, then release it.
async fn transmit(world: &World, id: NodeId, pkt_id: u64) {
    log_node(world, "Ts", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
    world.medium.borrow().start_transmission(world, id);

    const AP: NodeId = 0;
    world.scheduler.spawn(receive_frame(
        world.clone(),
        AP,
        id,
        pkt_id,
        DATA_PACKET_TIME,
        false,
    ));

    world.scheduler.timeout(DATA_PACKET_TIME).await;
    log_node(world, "To", 0, world.scheduler.now(), id, format_args!("{pkt_id}"));
    world.medium.borrow().stop_transmission(world, id);
}

/// Shared SINR-integrated reception process used for both the AP receiving
/// a data frame and a station receiving its ack (§4.5): the two are the
/// same time-integrated BPSK symbol-error computation over the receiver's
/// own [`EnergyHistory`], just with the roles of sender/receiver and frame
/// duration swapped.
async fn receive_frame(
    world: World,
    receiver: NodeId,
    transmitter: NodeId,
    pkt_id: u64,
    frame_time: u64,
    is_ack: bool,
) {
    let tag = if is_ack { " [ack]" } else { "" };
    let transmission_start = world.scheduler.now();
    if is_ack {
        log_node(&world, "Rs", 0, transmission_start, receiver, format_args!("{pkt_id}{tag}"));
    } else {
        log_node(
            &world,
            "Rs",
            0,
            transmission_start,
            receiver,
            format_args!("_{transmitter}_ {pkt_id}"),
        );
    }
    world.scheduler.timeout(frame_time).await;
    let transmission_end = world.scheduler.now();
    if is_ack {
        log_node(&world, "Ro", 0, transmission_end, receiver, format_args!("{pkt_id}{tag}"));
    } else {
        log_node(
            &world,
            "Ro",
            0,
            transmission_end,
            receiver,
            format_args!("_{transmitter}_ {pkt_id}"),
        );
    }

    let receiving_power = world.medium.borrow().get_power(transmitter, receiver);

    let mut reception_probability = 1.0f64;
    let mut current_state_end = transmission_end;
    let mut max_sim_tx: u32 = 0;

    {
        let idx = index_of(&world.arena, receiver);
        let arena = world.arena.borrow();
        let history = &arena[idx].energy;
        for sample in history.iter_newest_first() {
            if sample.when >= transmission_end {
                continue;
            }
            let dur = if sample.when <= transmission_start {
                let d = current_state_end - transmission_start;
                current_state_end = transmission_start;
                d
            } else {
                let d = current_state_end - sample.when;
                current_state_end = sample.when;
                d
            };
            let symbols = dur as f64 / SYMBOL_DURATION as f64;
            let sinr_dbm = receiving_power - sub_dbm(sample.level_dbm, receiving_power);
            max_sim_tx = max_sim_tx.max(sample.active_transmitters);

            let p_sym_err = erfc(dbm_to_mw(sinr_dbm).sqrt()) / 2.0;
            reception_probability *= (1.0 - p_sym_err).powf(symbols);

            if sample.when <= transmission_start {
                break;
            }
        }
    }
    let reception_probability = reception_probability.clamp(0.0, 1.0);

    if is_ack {
        log_node(
            &world,
            "PER",
            2,
            transmission_end,
            receiver,
            format_args!("{pkt_id}{tag} {reception_probability}"),
        );
    } else {
        log_node(
            &world,
            "PER",
            2,
            transmission_end,
            receiver,
            format_args!("_{transmitter}_ {pkt_id} {reception_probability}"),
        );
    }

    let u: f64 = world.rng.borrow_mut().r#gen();
    if u > reception_probability {
        if is_ack {
            log_node(
                &world,
                "d",
                0,
                world.scheduler.now(),
                receiver,
                format_args!("{pkt_id}{tag} {max_sim_tx}"),
            );
        } else {
            log_node(
                &world,
                "d",
                0,
                world.scheduler.now(),
                receiver,
                format_args!("_{transmitter}_ {pkt_id} {max_sim_tx}"),
            );
        }
        return;
    }
    if is_ack {
        log_node(
            &world,
            "r",
            0,
            world.scheduler.now(),
            receiver,
            format_args!("{pkt_id}{tag} {max_sim_tx}"),
        );
    } else {
        log_node(
            &world,
            "r",
            0,
            world.scheduler.now(),
            receiver,
            format_args!("_{transmitter}_ {pkt_id} {max_sim_tx}"),
        );
    }

    if is_ack {
        let idx = index_of(&world.arena, receiver);
        let ack_action = world.arena.borrow()[idx].ack_action.clone();
        if let Some(ev) = ack_action {
            ev.succeed();
        }
        return;
    }

    // AP: send an ack back to the station that just delivered this frame.
    log_node(
        &world,
        "MS",
        0,
        world.scheduler.now(),
        receiver,
        format_args!("_{transmitter}_ {pkt_id} [ack]"),
    );
    world.scheduler.timeout(SIFS).await;
    log_node(
        &world,
        "Ts",
        0,
        world.scheduler.now(),
        receiver,
        format_args!("_{transmitter}_ {pkt_id} [ack]"),
    );
    world.medium.borrow().start_transmission(&world, receiver);
    world.scheduler.spawn(receive_frame(
        world.clone(),
        transmitter,
        receiver,
        pkt_id,
        ACK_PACKET_TIME,
        true,
    ));
    world.scheduler.timeout(ACK_PACKET_TIME).await;
    world.medium.borrow().stop_transmission(&world, receiver);
    log_node(
        &world,
        "To",
        0,
        world.scheduler.now(),
        receiver,
        format_args!("_{transmitter}_ {pkt_id} [ack]"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_and_group_matches_group_cycle_formula() {
        // G=4 groups, S=100us slots: cycle length 400us.
        assert_eq!(cycle_and_group(0, 4, 100), (0, 0));
        assert_eq!(cycle_and_group(150, 4, 100), (0, 1));
        assert_eq!(cycle_and_group(450, 4, 100), (1, 0));
    }

    #[test]
    fn contention_window_growth_follows_binary_exponential_backoff() {
        let mut cw = CW_MIN;
        let mut seen = vec![cw];
        for _ in 0..10 {
            cw = (2 * (cw + 1) - 1).min(CW_MAX);
            seen.push(cw);
        }
        assert_eq!(seen.first(), Some(&15));
        assert!(seen.iter().all(|&c| c <= CW_MAX));
        assert_eq!(*seen.last().unwrap(), CW_MAX);
    }
}
