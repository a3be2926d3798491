//! Game Boy / Game Boy Color hardware core.
//!
//! The bus, PPU, cartridge mappers and the timer/DMA/interrupt glue between
//! them. Instruction execution is left to an implementation of
//! [`gameboy::Cpu`]; frontends drive the machine through [`gameboy::GameBoy`].

/// Sound register network and frame sequencer.
pub mod apu;

/// Cartridge mappers (MBC) and ROM/RAM/RTC handling.
pub mod cartridge;

/// Cycle divider used by the frame sequencer.
pub mod clock;

/// High-level facade that wires a CPU and the MMU into a single machine.
pub mod gameboy;

/// Joypad input register.
pub mod input;

/// Interrupt sources and the IF register.
pub mod interrupt;

/// Memory map, DMA and cycle accounting.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Serial port with no cable attached.
pub mod serial;

/// Divider/timer unit.
pub mod timer;
