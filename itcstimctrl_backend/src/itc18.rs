//! Provides a minimal rust wrapper for the parts of the Instrutech ITC-18 C library used to play
//! out a stimulus train.
//!
//! Built with the `itc18` feature; links against the vendor `ITC18` library.
//!
//! The vendor API works on a caller-allocated device structure whose size is reported by
//! `ITC18_GetStructureSize`. [`Itc18Handle`] owns that allocation and passes it to every call; it
//! closes the device when dropped. Status codes are returned untouched, checking happens in
//! [`crate::transport::itc_call`].

use crate::transport::*;

type CInt = libc::c_int;
type CShort = libc::c_short;
type DevicePtr = *mut libc::c_void;

#[link(name = "ITC18")]
extern "C" {
    fn ITC18_GetStructureSize() -> CInt;
    fn ITC18_Open(device: DevicePtr, device_number: CInt) -> CInt;
    fn ITC18_Close(device: DevicePtr) -> CInt;
    fn ITC18_Initialize(device: DevicePtr, mode: CInt) -> CInt;
    fn ITC18_SetDigitalInputMode(device: DevicePtr, latch: CInt, invert: CInt) -> CInt;
    fn ITC18_SetExternalTriggerMode(device: DevicePtr, external: CInt, invert: CInt) -> CInt;
    fn ITC18_GetFIFOSize(device: DevicePtr) -> CInt;
    fn ITC18_GetFIFOReadAvailableOverflow(device: DevicePtr, available: *mut CInt, overflow: *mut CInt) -> CInt;
    fn ITC18_SetSequence(device: DevicePtr, length: CInt, instructions: *const CInt) -> CInt;
    fn ITC18_StopAndInitialize(device: DevicePtr, stop: CInt, initialize: CInt) -> CInt;
    fn ITC18_GetFIFOWriteAvailable(device: DevicePtr, available: *mut CInt) -> CInt;
    fn ITC18_WriteFIFO(device: DevicePtr, length: CInt, buffer: *const CShort) -> CInt;
    fn ITC18_SetSamplingInterval(device: DevicePtr, timing: CInt, external_clock: CInt) -> CInt;
    fn ITC18_Start(
        device: DevicePtr,
        external_trigger: CInt,
        output_enable: CInt,
        stop_on_overflow: CInt,
        stop_on_underrun: CInt,
    ) -> CInt;
    fn ITC18_Stop(device: DevicePtr) -> CInt;
}

/// Opens ITC-18 devices through the vendor library.
#[derive(Default)]
pub struct Itc18Driver;

impl ItcDriver for Itc18Driver {
    fn open(&mut self, mode: OpenMode) -> Result<Box<dyn ItcHandle>, ItcStatus> {
        let size = unsafe { ITC18_GetStructureSize() }.max(0) as usize;
        // Word-aligned backing for the vendor structure
        let mut storage = vec![0u64; size.div_ceil(8)];
        let status = unsafe { ITC18_Open(storage.as_mut_ptr() as DevicePtr, mode.device_number()) };
        if status != ITC18_NO_ERR {
            // The driver may hold partial state after a failed open
            unsafe { ITC18_Close(storage.as_mut_ptr() as DevicePtr) };
            return Err(status);
        }
        Ok(Box::new(Itc18Handle { storage, open: true }))
    }
}

/// An open ITC-18, owning the vendor device structure.
pub struct Itc18Handle {
    storage: Vec<u64>,
    open: bool,
}

impl Itc18Handle {
    fn device(&mut self) -> DevicePtr {
        self.storage.as_mut_ptr() as DevicePtr
    }

    fn shutdown(&mut self) {
        if self.open {
            self.open = false;
            let device = self.device();
            unsafe { ITC18_Close(device) };
        }
    }
}

impl ItcHandle for Itc18Handle {
    fn initialize(&mut self, mode: i32) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_Initialize(device, mode) }
    }

    fn set_digital_input_mode(&mut self, latch: bool, invert: bool) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_SetDigitalInputMode(device, latch as CInt, invert as CInt) }
    }

    fn set_external_trigger_mode(&mut self, external: bool, invert: bool) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_SetExternalTriggerMode(device, external as CInt, invert as CInt) }
    }

    fn fifo_size(&mut self) -> usize {
        let device = self.device();
        unsafe { ITC18_GetFIFOSize(device) }.max(0) as usize
    }

    fn fifo_read_available_overflow(&mut self) -> Result<(usize, bool), ItcStatus> {
        let device = self.device();
        let (mut available, mut overflow): (CInt, CInt) = (0, 0);
        let status = unsafe { ITC18_GetFIFOReadAvailableOverflow(device, &mut available, &mut overflow) };
        match status {
            ITC18_NO_ERR => Ok((available.max(0) as usize, overflow != 0)),
            status => Err(status),
        }
    }

    fn set_sequence(&mut self, instructions: &[i32]) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_SetSequence(device, instructions.len() as CInt, instructions.as_ptr()) }
    }

    fn stop_and_initialize(&mut self, stop: bool, initialize: bool) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_StopAndInitialize(device, stop as CInt, initialize as CInt) }
    }

    fn fifo_write_available(&mut self) -> Result<usize, ItcStatus> {
        let device = self.device();
        let mut available: CInt = 0;
        match unsafe { ITC18_GetFIFOWriteAvailable(device, &mut available) } {
            ITC18_NO_ERR => Ok(available.max(0) as usize),
            status => Err(status),
        }
    }

    fn write_fifo(&mut self, samples: &[i16]) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_WriteFIFO(device, samples.len() as CInt, samples.as_ptr()) }
    }

    fn set_sampling_interval(&mut self, ticks_per_instruction: u32, external_clock: bool) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_SetSamplingInterval(device, ticks_per_instruction as CInt, external_clock as CInt) }
    }

    fn start(
        &mut self,
        external_trigger: bool,
        output_enable: bool,
        stop_on_overflow: bool,
        stop_on_underrun: bool,
    ) -> ItcStatus {
        let device = self.device();
        unsafe {
            ITC18_Start(
                device,
                external_trigger as CInt,
                output_enable as CInt,
                stop_on_overflow as CInt,
                stop_on_underrun as CInt,
            )
        }
    }

    fn stop(&mut self) -> ItcStatus {
        let device = self.device();
        unsafe { ITC18_Stop(device) }
    }

    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

// Define deletion behavior
impl Drop for Itc18Handle {
    fn drop(&mut self) {
        self.shutdown()
    }
}
